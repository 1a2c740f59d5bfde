//! # Web Console Adapter
//!
//! Maps decoded HTTP requests onto the same command path the serial console
//! uses. The embedding runs the actual TCP/HTTP listener and exchanges
//! [`WebRequest`]/[`WebResponse`] values over their channels; this task only
//! translates `/api/<verb>` plus query parameters into a command line,
//! submits it through the router, and waits for the correlated outcome.
//! Endpoints therefore map 1:1 to console verbs by construction.
//!
//! `WEB_CONSOLE_ACTIVE` is held high while the adapter is running so status
//! consumers can tell whether the remote path is live.

use embassy_time::{Duration, Instant};
use heapless::String;
use log::{log, Level};

use crate::command_router::{CommandRouter, SubmitError};
use crate::message_channel::ReceiveError;
use crate::messages::{CommandOrigin, CommandResponse, CorrelationId};
use crate::signal_set::SignalSet;
use crate::task_supervisor::TaskContext;
use crate::{
    events, WebCommandResponseChannel, WebRequestChannel, WebResponseChannel, DEFAULT_SEND_TIMEOUT,
};

/// Tick period of the adapter loop while no request is pending; also the
/// slice length of the answer wait.
const CONSOLE_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound on one command's lifetime, sized for the longest analysis job
/// plus margin. The adapter serves requests serially.
const ANSWER_TIMEOUT: Duration = Duration::from_secs(130);

/// One decoded HTTP request, produced by the embedding's listener.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct WebRequest {
    /// Listener-assigned id echoed back in the response.
    pub request_id: u32,
    /// Request path, expected shape `/api/<verb>`.
    pub path: String<32>,
    /// Raw query string, `KEY=value` pairs joined by `&`. The reserved key
    /// `args` carries positional arguments with `+` as the separator.
    pub query: String<96>,
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum WebOutcome {
    /// The correlated outcome of an accepted command.
    Answered(CommandResponse),
    /// The submission never entered the task graph.
    Refused(SubmitError),
    /// Accepted, but no outcome arrived in time.
    TimedOut(CorrelationId),
}

#[cfg_attr(feature = "std", derive(Debug))]
pub struct WebResponse {
    pub request_id: u32,
    pub outcome: WebOutcome,
}

/// Rebuilds the console line a request encodes. `None` when the path is not
/// an api endpoint or the line does not fit.
pub(crate) fn decode_request(path: &str, query: &str) -> Option<String<160>> {
    let verb = path.strip_prefix("/api/")?;
    if verb.is_empty() || verb.contains('/') {
        return None;
    }
    let mut line: String<160> = String::new();
    line.push_str(verb).ok()?;
    // Positional text first, so `connect` style verbs read naturally.
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.eq_ignore_ascii_case("args") {
            for word in value.split('+').filter(|w| !w.is_empty()) {
                line.push(' ').ok()?;
                line.push_str(word).ok()?;
            }
        }
    }
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, _) = pair.split_once('=').unwrap_or((pair, ""));
        if !key.eq_ignore_ascii_case("args") {
            line.push(' ').ok()?;
            line.push_str(pair).ok()?;
        }
    }
    Some(line)
}

/// Serial request handler, split from the task wrapper for host tests.
pub(crate) struct WebConsole {
    context: &'static TaskContext,
    router: &'static CommandRouter,
    command_responses: &'static WebCommandResponseChannel,
}

impl WebConsole {
    pub(crate) fn new(
        context: &'static TaskContext,
        router: &'static CommandRouter,
        command_responses: &'static WebCommandResponseChannel,
    ) -> Self {
        WebConsole {
            context,
            router,
            command_responses,
        }
    }

    pub(crate) async fn handle_request(&self, request: WebRequest) -> WebResponse {
        let line = match decode_request(&request.path, &request.query) {
            Some(line) => line,
            None => {
                let mut reason: String<96> = String::new();
                let _ = reason.push_str("not an api endpoint");
                return WebResponse {
                    request_id: request.request_id,
                    outcome: WebOutcome::Refused(SubmitError::Malformed { reason }),
                };
            }
        };
        let correlation_id = match self.router.submit(&line, CommandOrigin::Web).await {
            Ok(id) => id,
            Err(error) => {
                return WebResponse {
                    request_id: request.request_id,
                    outcome: WebOutcome::Refused(error),
                }
            }
        };
        // The full wait covers the longest analysis job, far past the
        // supervision budget, so it is sliced into short receives with a
        // heartbeat between them.
        let deadline = Instant::now() + ANSWER_TIMEOUT;
        let outcome = loop {
            match self.command_responses.receive(CONSOLE_RECEIVE_TIMEOUT).await {
                Ok(response) if response.correlation_id == correlation_id => break WebOutcome::Answered(response),
                // A stale answer from an earlier timed-out request.
                Ok(_) => continue,
                Err(ReceiveError::Closed) => break WebOutcome::TimedOut(correlation_id),
                Err(ReceiveError::Timeout) => {
                    self.context.heartbeat();
                    if Instant::now() >= deadline {
                        break WebOutcome::TimedOut(correlation_id);
                    }
                }
            }
        };
        WebResponse {
            request_id: request.request_id,
            outcome,
        }
    }
}

#[embassy_executor::task]
pub(crate) async fn web_console_task(
    context: &'static TaskContext,
    router: &'static CommandRouter,
    requests: &'static WebRequestChannel,
    responses: &'static WebResponseChannel,
    command_responses: &'static WebCommandResponseChannel,
    signals: &'static SignalSet,
) {
    log!(Level::Info, "web console task started");
    signals.raise(events::WEB_CONSOLE_ACTIVE);
    let console = WebConsole::new(context, router, command_responses);
    loop {
        context.pause_point().await;
        if context.should_stop() {
            break;
        }
        context.blocked();
        match requests.receive(CONSOLE_RECEIVE_TIMEOUT).await {
            Ok(request) => {
                context.heartbeat();
                let request_id = request.request_id;
                let response = console.handle_request(request).await;
                if responses.send(response, DEFAULT_SEND_TIMEOUT).await.is_err() {
                    log!(Level::Error, "Web response channel saturated, dropping answer to request {}", request_id);
                }
            }
            Err(ReceiveError::Timeout) => context.heartbeat(),
            Err(ReceiveError::Closed) => break,
        }
    }
    signals.clear(events::WEB_CONSOLE_ACTIVE);
    context.shutdown_complete();
    log!(Level::Info, "web console task stopped");
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::command_router::ResponsePath;
    use crate::messages::{RadioCommand, ResponseDetail};
    use crate::radio_coordinator::WifiState;
    use crate::signal_set::SignalSet;
    use crate::task_supervisor::TaskSupervisor;
    use crate::test_support::run;
    use crate::wifi_devices::ScanTable;
    use crate::{
        AnalysisCommandChannel, ConsoleResponseChannel, InternalResponseChannel, RadioCommandChannel,
        ScanTableRegion, WifiStateRegion,
    };
    use embassy_futures::join::join;
    use embassy_time::Timer;

    #[test]
    fn decodes_named_and_positional_arguments() {
        let line = decode_request("/api/startap", "SSID=Lab&CH=6").unwrap();
        assert_eq!(line.as_str(), "startap SSID=Lab CH=6");
        let line = decode_request("/api/connect", "args=MyNet+secretpass").unwrap();
        assert_eq!(line.as_str(), "connect MyNet secretpass");
        let line = decode_request("/api/status", "").unwrap();
        assert_eq!(line.as_str(), "status");
    }

    #[test]
    fn rejects_paths_outside_the_api() {
        assert!(decode_request("/index.html", "").is_none());
        assert!(decode_request("/api/", "").is_none());
        assert!(decode_request("/api/a/b", "").is_none());
    }

    struct Fixture {
        console: WebConsole,
        context: &'static TaskContext,
        radio: &'static RadioCommandChannel,
        web: &'static WebCommandResponseChannel,
    }

    fn fixture() -> Fixture {
        let radio: &'static RadioCommandChannel = Box::leak(Box::new(RadioCommandChannel::new("radio-commands")));
        let analysis: &'static AnalysisCommandChannel =
            Box::leak(Box::new(AnalysisCommandChannel::new("analysis-commands")));
        let console_out: &'static ConsoleResponseChannel =
            Box::leak(Box::new(ConsoleResponseChannel::new("console-responses")));
        let web: &'static WebCommandResponseChannel =
            Box::leak(Box::new(WebCommandResponseChannel::new("web-cmd-responses")));
        let internal: &'static InternalResponseChannel =
            Box::leak(Box::new(InternalResponseChannel::new("internal-responses")));
        let responses: &'static ResponsePath = Box::leak(Box::new(ResponsePath::new(console_out, web, internal)));
        let supervisor: &'static TaskSupervisor = Box::leak(Box::new(TaskSupervisor::new()));
        let wifi_state: &'static WifiStateRegion =
            Box::leak(Box::new(WifiStateRegion::new("wifi-state", WifiState::boot())));
        let scan_table: &'static ScanTableRegion = Box::leak(Box::new(ScanTableRegion::new("scan-table", ScanTable::new())));
        let _signals: &'static SignalSet = Box::leak(Box::new(SignalSet::new()));
        let router: &'static CommandRouter = Box::leak(Box::new(CommandRouter::new(
            radio, analysis, responses, supervisor, wifi_state, scan_table,
        )));
        let context: &'static TaskContext = Box::leak(Box::new(TaskContext::new()));
        Fixture {
            console: WebConsole::new(context, router, web),
            context,
            radio,
            web,
        }
    }

    fn request(path: &str, query: &str) -> WebRequest {
        let mut req = WebRequest {
            request_id: 42,
            path: String::new(),
            query: String::new(),
        };
        let _ = req.path.push_str(path);
        let _ = req.query.push_str(query);
        req
    }

    #[test]
    fn answered_request_carries_the_correlated_response() {
        run(|| async {
            let f = fixture();
            let (radio, web) = (f.radio, f.web);
            let coordinator_stub = async {
                let command = radio.receive(Duration::from_secs(1)).await.unwrap();
                assert_eq!(command.verb, RadioCommand::Scan);
                web.try_send(CommandResponse::done_with(
                    command.correlation_id,
                    "scan",
                    ResponseDetail::ScanSummary { entries: 4 },
                ))
                .unwrap();
            };
            let response = join(f.console.handle_request(request("/api/scan", "")), coordinator_stub).await.0;
            assert_eq!(response.request_id, 42);
            match response.outcome {
                WebOutcome::Answered(answer) => {
                    assert!(answer.is_done());
                    assert!(matches!(answer.detail, ResponseDetail::ScanSummary { entries: 4 }));
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        });
    }

    #[test]
    fn slow_answer_still_reaches_the_request() {
        run(|| async {
            let f = fixture();
            let (radio, web) = (f.radio, f.web);
            let before = f.context.heartbeat_count();
            let coordinator_stub = async {
                let command = radio.receive(Duration::from_secs(1)).await.unwrap();
                // Answer after the adapter's receive slice expires once, so
                // the wait demonstrably survives a slice boundary.
                Timer::after(Duration::from_millis(1200)).await;
                web.try_send(CommandResponse::done(command.correlation_id, "scan")).unwrap();
            };
            let response = join(f.console.handle_request(request("/api/scan", "")), coordinator_stub).await.0;
            assert!(matches!(response.outcome, WebOutcome::Answered(_)));
            // The sliced wait kept reporting liveness while parked.
            assert!(f.context.heartbeat_count() > before);
        });
    }

    #[test]
    fn malformed_request_is_refused_without_reaching_a_channel() {
        run(|| async {
            let f = fixture();
            let response = f.console.handle_request(request("/api/connect", "")).await;
            assert!(matches!(response.outcome, WebOutcome::Refused(SubmitError::Malformed { .. })));
            assert_eq!(f.radio.depth(), 0);
        });
    }

    #[test]
    fn router_local_verbs_answer_inline() {
        run(|| async {
            let f = fixture();
            let response = f.console.handle_request(request("/api/help", "")).await;
            match response.outcome {
                WebOutcome::Answered(answer) => assert!(answer.is_done()),
                other => panic!("unexpected outcome {:?}", other),
            }
        });
    }
}
