//! # Command Router - The Trust Boundary for Operator Input
//!
//! Console lines and decoded web requests enter the task graph here and
//! nowhere else. [`CommandRouter::submit`] parses the verb, validates the
//! arguments against the per-verb schema, and only then constructs a typed
//! [`Command`] and places it on the owning task's channel with a
//! non-blocking send. Malformed text is rejected synchronously with a
//! descriptive reason and never reaches a task; a saturated channel is
//! reported back to the producer, never silently dropped.
//!
//! Three verbs (`status`, `tasks`, `help`) are answered by the router itself
//! from read-only snapshots. They still produce a correlated
//! [`CommandResponse`] on the origin's response channel, so every accepted
//! submission yields exactly one outcome through one path.
//!
//! [`ResponsePath`] is the reverse direction: it bundles the per-origin
//! response channels so owning tasks deliver each outcome to the channel its
//! command came in from.

use core::fmt;
use core::fmt::Write as _;

use heapless::{String, Vec};
use log::{log, Level};

use crate::message_channel::SendError;
use crate::messages::{
    next_correlation_id, AnalysisCommand, ApConfigPatch, Command, CommandOrigin, CommandResponse, ConfigOp,
    CorrelationId, Credential, RadioCommand, RejectReason, ResponseDetail, StationProfile, StatusReport,
};
use crate::task_supervisor::{TaskId, TaskSupervisor};
use crate::{
    AnalysisCommandChannel, ConsoleResponseChannel, InternalResponseChannel, RadioCommandChannel, ScanTableRegion,
    WebCommandResponseChannel, WifiStateRegion, DEFAULT_SEND_TIMEOUT, REGION_ACQUIRE_TIMEOUT,
};

/// One line, served by the `help` verb.
const HELP_TEXT: &str =
    "verbs: scan connect disconnect startap stopap reset apcfg stacfg latency chanscan throughput status tasks help";

/// Why a submission was refused at the boundary.
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SubmitError {
    /// Validation failed; no command entered any channel.
    Malformed { reason: String<96> },
    /// The target channel is saturated; the named channel rejected the send.
    Full { channel: &'static str },
    /// The target channel is closed; the system is shutting down.
    Shutdown,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Malformed { reason } => write!(f, "malformed: {}", reason),
            SubmitError::Full { channel } => write!(f, "channel '{}' full", channel),
            SubmitError::Shutdown => write!(f, "shutting down"),
        }
    }
}

fn malformed(reason: &str) -> SubmitError {
    let mut text: String<96> = String::new();
    let _ = text.push_str(reason);
    SubmitError::Malformed { reason: text }
}

fn malformed_fmt(args: fmt::Arguments<'_>) -> SubmitError {
    let mut text: String<96> = String::new();
    let _ = text.write_fmt(args);
    SubmitError::Malformed { reason: text }
}

/// The per-origin response channels, bundled so owning tasks can answer a
/// command without knowing which boundary it entered through.
pub struct ResponsePath {
    console: &'static ConsoleResponseChannel,
    web: &'static WebCommandResponseChannel,
    internal: &'static InternalResponseChannel,
}

impl ResponsePath {
    pub const fn new(
        console: &'static ConsoleResponseChannel,
        web: &'static WebCommandResponseChannel,
        internal: &'static InternalResponseChannel,
    ) -> Self {
        ResponsePath { console, web, internal }
    }

    pub fn console(&self) -> &'static ConsoleResponseChannel {
        self.console
    }

    pub fn web(&self) -> &'static WebCommandResponseChannel {
        self.web
    }

    pub fn internal(&self) -> &'static InternalResponseChannel {
        self.internal
    }

    /// Delivers one outcome to the channel matching its origin. A saturated
    /// response channel is a consumer that stopped reading; the outcome is
    /// logged and dropped rather than wedging the owning task.
    pub async fn deliver(&self, origin: CommandOrigin, response: CommandResponse) {
        let (name, result) = match origin {
            CommandOrigin::Console => (self.console.name(), self.console.send(response, DEFAULT_SEND_TIMEOUT).await.map(drop).map_err(drop)),
            CommandOrigin::Web => (self.web.name(), self.web.send(response, DEFAULT_SEND_TIMEOUT).await.map(drop).map_err(drop)),
            CommandOrigin::Internal => (self.internal.name(), self.internal.send(response, DEFAULT_SEND_TIMEOUT).await.map(drop).map_err(drop)),
        };
        if result.is_err() {
            log!(Level::Error, "Response channel '{}' saturated, outcome dropped", name);
        }
    }
}

/// Parses, validates, and routes operator commands. See the module docs for
/// the verb table.
pub struct CommandRouter {
    radio: &'static RadioCommandChannel,
    analysis: &'static AnalysisCommandChannel,
    responses: &'static ResponsePath,
    supervisor: &'static TaskSupervisor,
    wifi_state: &'static WifiStateRegion,
    scan_table: &'static ScanTableRegion,
}

impl CommandRouter {
    pub const fn new(
        radio: &'static RadioCommandChannel,
        analysis: &'static AnalysisCommandChannel,
        responses: &'static ResponsePath,
        supervisor: &'static TaskSupervisor,
        wifi_state: &'static WifiStateRegion,
        scan_table: &'static ScanTableRegion,
    ) -> Self {
        CommandRouter {
            radio,
            analysis,
            responses,
            supervisor,
            wifi_state,
            scan_table,
        }
    }

    /// Submits one line of operator input. On acceptance the returned
    /// correlation id matches the eventual [`CommandResponse`] on the
    /// origin's response channel.
    pub async fn submit(&self, raw: &str, origin: CommandOrigin) -> Result<CorrelationId, SubmitError> {
        let mut tokens = raw.split_ascii_whitespace();
        let verb = match tokens.next() {
            Some(verb) => verb,
            None => return Err(malformed("empty command")),
        };
        let mut args: Vec<&str, 8> = Vec::new();
        for token in tokens {
            if args.push(token).is_err() {
                return Err(malformed("too many arguments"));
            }
        }

        if verb.eq_ignore_ascii_case("scan") {
            self.dispatch_radio(origin, parse_scan(&args)?)
        } else if verb.eq_ignore_ascii_case("connect") {
            self.dispatch_radio(origin, parse_connect(&args)?)
        } else if verb.eq_ignore_ascii_case("disconnect") {
            expect_no_args("disconnect", &args)?;
            self.dispatch_radio(origin, RadioCommand::Disconnect)
        } else if verb.eq_ignore_ascii_case("startap") {
            self.dispatch_radio(origin, parse_startap(&args)?)
        } else if verb.eq_ignore_ascii_case("stopap") {
            expect_no_args("stopap", &args)?;
            self.dispatch_radio(origin, RadioCommand::StopAp)
        } else if verb.eq_ignore_ascii_case("reset") {
            expect_no_args("reset", &args)?;
            self.dispatch_radio(origin, RadioCommand::Reset)
        } else if verb.eq_ignore_ascii_case("apcfg") {
            self.dispatch_radio(origin, RadioCommand::ApConfigOp(parse_config_op("apcfg", &args)?))
        } else if verb.eq_ignore_ascii_case("stacfg") {
            self.dispatch_radio(origin, RadioCommand::StationConfigOp(parse_config_op("stacfg", &args)?))
        } else if verb.eq_ignore_ascii_case("latency") {
            self.dispatch_analysis(origin, parse_latency(&args)?)
        } else if verb.eq_ignore_ascii_case("chanscan") {
            expect_no_args("chanscan", &args)?;
            self.dispatch_analysis(origin, AnalysisCommand::ChannelScan)
        } else if verb.eq_ignore_ascii_case("throughput") {
            self.dispatch_analysis(origin, parse_throughput(&args)?)
        } else if verb.eq_ignore_ascii_case("status") {
            expect_no_args("status", &args)?;
            self.answer_status(origin).await
        } else if verb.eq_ignore_ascii_case("tasks") {
            expect_no_args("tasks", &args)?;
            self.answer_tasks(origin).await
        } else if verb.eq_ignore_ascii_case("help") {
            expect_no_args("help", &args)?;
            self.answer_help(origin).await
        } else {
            Err(malformed_fmt(format_args!("unknown verb '{}' (try 'help')", verb)))
        }
    }

    fn dispatch_radio(&self, origin: CommandOrigin, verb: RadioCommand) -> Result<CorrelationId, SubmitError> {
        let command = Command::new(origin, verb);
        let correlation_id = command.correlation_id;
        match self.radio.try_send(command) {
            Ok(()) => Ok(correlation_id),
            Err(SendError::Closed(_)) => Err(SubmitError::Shutdown),
            Err(_) => Err(SubmitError::Full {
                channel: self.radio.name(),
            }),
        }
    }

    fn dispatch_analysis(&self, origin: CommandOrigin, verb: AnalysisCommand) -> Result<CorrelationId, SubmitError> {
        let command = Command::new(origin, verb);
        let correlation_id = command.correlation_id;
        match self.analysis.try_send(command) {
            Ok(()) => Ok(correlation_id),
            Err(SendError::Closed(_)) => Err(SubmitError::Shutdown),
            Err(_) => Err(SubmitError::Full {
                channel: self.analysis.name(),
            }),
        }
    }

    /// `status`: connectivity snapshot plus channel and region counters,
    /// collected without touching any owning task.
    async fn answer_status(&self, origin: CommandOrigin) -> Result<CorrelationId, SubmitError> {
        let correlation_id = next_correlation_id();
        let response = match self.wifi_state.snapshot(TaskId::EMBEDDER, REGION_ACQUIRE_TIMEOUT).await {
            Ok(wifi) => {
                let mut channels = Vec::new();
                let _ = channels.push((self.radio.name(), self.radio.stats()));
                let _ = channels.push((self.analysis.name(), self.analysis.stats()));
                let _ = channels.push((self.responses.console().name(), self.responses.console().stats()));
                let _ = channels.push((self.responses.web().name(), self.responses.web().stats()));
                let _ = channels.push((self.responses.internal().name(), self.responses.internal().stats()));
                let mut regions = Vec::new();
                let _ = regions.push((self.wifi_state.name(), self.wifi_state.timeout_count()));
                let _ = regions.push((self.scan_table.name(), self.scan_table.timeout_count()));
                let report = StatusReport { wifi, channels, regions };
                CommandResponse::done_with(correlation_id, "status", ResponseDetail::Status(report))
            }
            Err(_) => CommandResponse::rejected(correlation_id, "status", RejectReason::Busy("state region held")),
        };
        self.responses.deliver(origin, response).await;
        Ok(correlation_id)
    }

    async fn answer_tasks(&self, origin: CommandOrigin) -> Result<CorrelationId, SubmitError> {
        let correlation_id = next_correlation_id();
        let detail = ResponseDetail::Tasks(self.supervisor.reports());
        self.responses
            .deliver(origin, CommandResponse::done_with(correlation_id, "tasks", detail))
            .await;
        Ok(correlation_id)
    }

    async fn answer_help(&self, origin: CommandOrigin) -> Result<CorrelationId, SubmitError> {
        let correlation_id = next_correlation_id();
        self.responses
            .deliver(origin, CommandResponse::done_text(correlation_id, "help", HELP_TEXT))
            .await;
        Ok(correlation_id)
    }
}

fn expect_no_args(verb: &'static str, args: &[&str]) -> Result<(), SubmitError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(malformed_fmt(format_args!("'{}' takes no arguments", verb)))
    }
}

/// Splits a `KEY=value` token; case of the key is folded by the caller.
fn named_arg<'a>(token: &'a str) -> Option<(&'a str, &'a str)> {
    token.split_once('=')
}

fn parse_number(key: &'static str, value: &str, min: u32, max: u32) -> Result<u32, SubmitError> {
    match value.parse::<u32>() {
        Ok(number) if number >= min && number <= max => Ok(number),
        _ => Err(malformed_fmt(format_args!("{} must be {}..{}", key, min, max))),
    }
}

fn parse_ssid(text: &str) -> Result<String<32>, SubmitError> {
    if text.is_empty() || text.len() > 32 {
        return Err(malformed("ssid must be 1..32 characters"));
    }
    let mut ssid: String<32> = String::new();
    let _ = ssid.push_str(text);
    Ok(ssid)
}

fn parse_credential(text: &str) -> Result<Credential, SubmitError> {
    Credential::from_text(text).ok_or_else(|| malformed("credential must be 8..63 characters"))
}

fn parse_scan(args: &[&str]) -> Result<RadioCommand, SubmitError> {
    match args {
        [] => Ok(RadioCommand::Scan),
        [mode] if mode.eq_ignore_ascii_case("now") => Ok(RadioCommand::Scan),
        [mode] if mode.eq_ignore_ascii_case("on") => Ok(RadioCommand::SetAutoScan(true)),
        [mode] if mode.eq_ignore_ascii_case("off") => Ok(RadioCommand::SetAutoScan(false)),
        _ => Err(malformed("usage: scan [now|on|off]")),
    }
}

fn parse_connect(args: &[&str]) -> Result<RadioCommand, SubmitError> {
    let (ssid, credential) = match args {
        [ssid] => (parse_ssid(ssid)?, None),
        [ssid, credential] => (parse_ssid(ssid)?, Some(parse_credential(credential)?)),
        _ => return Err(malformed("usage: connect <ssid> [credential]")),
    };
    Ok(RadioCommand::Connect(StationProfile { ssid, credential }))
}

fn parse_startap(args: &[&str]) -> Result<RadioCommand, SubmitError> {
    let mut patch = ApConfigPatch::default();
    for token in args {
        let (key, value) = match named_arg(token) {
            Some(pair) => pair,
            None => return Err(malformed("usage: startap [SSID=s] [PASS=p] [CH=n]")),
        };
        if key.eq_ignore_ascii_case("ssid") {
            patch.ssid = Some(parse_ssid(value)?);
        } else if key.eq_ignore_ascii_case("pass") {
            patch.credential = Some(parse_credential(value)?);
        } else if key.eq_ignore_ascii_case("ch") {
            patch.channel = Some(parse_number("CH", value, 1, 13)? as u8);
        } else {
            return Err(malformed_fmt(format_args!("unknown startap argument '{}'", key)));
        }
    }
    Ok(RadioCommand::StartAp(patch))
}

fn parse_config_op(verb: &'static str, args: &[&str]) -> Result<ConfigOp, SubmitError> {
    match args {
        [op] if op.eq_ignore_ascii_case("save") => Ok(ConfigOp::Save),
        [op] if op.eq_ignore_ascii_case("load") => Ok(ConfigOp::Load),
        [op] if op.eq_ignore_ascii_case("show") => Ok(ConfigOp::Show),
        [op] if op.eq_ignore_ascii_case("clear") => Ok(ConfigOp::Clear),
        _ => Err(malformed_fmt(format_args!("usage: {} save|load|show|clear", verb))),
    }
}

fn parse_host(text: &str) -> Result<String<64>, SubmitError> {
    if text.is_empty() || text.len() > 64 {
        return Err(malformed("host must be 1..64 characters"));
    }
    let mut host: String<64> = String::new();
    let _ = host.push_str(text);
    Ok(host)
}

fn parse_latency(args: &[&str]) -> Result<AnalysisCommand, SubmitError> {
    let (first, rest) = match args.split_first() {
        Some(split) => split,
        None => return Err(malformed("usage: latency <host> [COUNT=n] | latency stop")),
    };
    if first.eq_ignore_ascii_case("stop") {
        expect_no_args("latency stop", rest)?;
        return Ok(AnalysisCommand::Stop);
    }
    let host = parse_host(first)?;
    let mut count: u8 = 10;
    for token in rest {
        match named_arg(token) {
            Some((key, value)) if key.eq_ignore_ascii_case("count") => {
                count = parse_number("COUNT", value, 1, 100)? as u8;
            }
            _ => return Err(malformed_fmt(format_args!("unknown latency argument '{}'", token))),
        }
    }
    Ok(AnalysisCommand::Latency { host, count })
}

fn parse_throughput(args: &[&str]) -> Result<AnalysisCommand, SubmitError> {
    let (first, rest) = match args.split_first() {
        Some(split) => split,
        None => return Err(malformed("usage: throughput <host> [PORT=n] [SECS=n] | throughput stop")),
    };
    if first.eq_ignore_ascii_case("stop") {
        expect_no_args("throughput stop", rest)?;
        return Ok(AnalysisCommand::Stop);
    }
    let host = parse_host(first)?;
    let mut port: u16 = 5201;
    let mut seconds: u8 = 10;
    for token in rest {
        match named_arg(token) {
            Some((key, value)) if key.eq_ignore_ascii_case("port") => {
                port = parse_number("PORT", value, 1, 65535)? as u16;
            }
            Some((key, value)) if key.eq_ignore_ascii_case("secs") => {
                seconds = parse_number("SECS", value, 1, 120)? as u8;
            }
            _ => return Err(malformed_fmt(format_args!("unknown throughput argument '{}'", token))),
        }
    }
    Ok(AnalysisCommand::Throughput { host, port, seconds })
}
