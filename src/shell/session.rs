//! One line-protocol connection: read a line, dispatch it, write the reply,
//! re-prompt.

use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use super::tokenizer::{parameter_source, tokenize};
use super::SHELL_TARGET;
use crate::error::{DispatchError, UNKNOWN_COMMAND_TEXT};
use crate::registry::catalog::{command_help, help_text};
use crate::registry::execute::invoke_descriptor;
use crate::registry::{Emitter, SharedRegistry};
use crate::server::ShutdownSignal;
use crate::settings::ShellSettings;

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line(String),
    TooLong,
    Eof,
}

/// Read one `\n`-terminated line of at most `limit` bytes (terminator
/// excluded). Trailing `\r` is dropped and invalid UTF-8 is replaced.
async fn read_line<R>(reader: &mut R, limit: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(cap).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() > limit {
        return Ok(LineRead::TooLong);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
}

/// Chunks queued for the socket writer before `emit` and replies wait on it.
const OUTPUT_QUEUE: usize = 64;

/// Text for a successful result: strings verbatim, anything else
/// (`null` included) pretty-printed.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Evaluate one non-empty input line. Returns the reply text, if any.
async fn evaluate(line: &str, registry: &SharedRegistry, emit: &Emitter, peer: &str) -> Option<String> {
    let tokens = tokenize(line);
    let (head, rest) = tokens.split_first()?;

    if head.text == "help" && !head.quoted {
        let topic = rest.first().map(|t| t.text.as_str());
        return Some(help_text(registry, topic));
    }

    let Some(descriptor) = registry.lookup(&head.text) else {
        tracing::debug!(target: SHELL_TARGET, peer, command = %head.text, "unknown command");
        return Some(UNKNOWN_COMMAND_TEXT.to_string());
    };

    tracing::debug!(target: SHELL_TARGET, peer, command = %descriptor.name, "dispatching");
    let source = parameter_source(rest, &descriptor);
    match invoke_descriptor(Arc::clone(&descriptor), &source, emit.clone()).await {
        Ok(value) => Some(render_value(&value)),
        Err(DispatchError::Params(error)) => {
            Some(format!("Error: {error}\n{}", command_help(&descriptor)))
        }
        Err(error) => Some(format!("Error: {error}")),
    }
}

/// Serve a single connection until EOF, an oversized line, or shutdown.
pub async fn run_session<S>(
    stream: S,
    registry: SharedRegistry,
    settings: Arc<ShellSettings>,
    mut shutdown: ShutdownSignal,
    peer: String,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    // Replies and streamed command output share one ordered, bounded queue;
    // a slow reader stalls the command at its next `emit`.
    let (tx, mut rx) = mpsc::channel::<String>(OUTPUT_QUEUE);
    let writer = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            write_half.write_all(chunk.as_bytes()).await?;
            write_half.flush().await?;
        }
        write_half.shutdown().await
    });

    let emit = {
        let tx = tx.clone();
        Emitter::new(move |line| {
            let tx = tx.clone();
            async move {
                // A closed queue means the writer is gone; the session ends on its own.
                let _ = tx.send(format!("{line}\n")).await;
            }
        })
    };

    let _ = tx.send(format!("{}\n", settings.banner)).await;
    let _ = tx.send(settings.prompt.clone()).await;

    let outcome = loop {
        let read = tokio::select! {
            biased;
            () = shutdown.wait() => break Ok(()),
            read = read_line(&mut reader, settings.max_line_bytes) => read,
        };
        match read {
            Ok(LineRead::Line(line)) => {
                if !line.trim().is_empty() {
                    if let Some(reply) = evaluate(&line, &registry, &emit, &peer).await {
                        let _ = tx.send(format!("{reply}\n")).await;
                    }
                }
                let _ = tx.send(settings.prompt.clone()).await;
            }
            Ok(LineRead::TooLong) => {
                tracing::warn!(
                    target: SHELL_TARGET,
                    peer = %peer,
                    limit = settings.max_line_bytes,
                    "input line too long; closing connection"
                );
                let _ = tx
                    .send(format!("Error: input line exceeds {} bytes\n", settings.max_line_bytes))
                    .await;
                break Ok(());
            }
            Ok(LineRead::Eof) => break Ok(()),
            Err(error) => break Err(error),
        }
    };

    drop(emit);
    drop(tx);
    match writer.await {
        Ok(written) => outcome.and(written),
        Err(join_error) => Err(io::Error::other(join_error)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::registry::{Arguments, CommandDescriptor, ParamParser, ParameterSpec, Registry};
    use crate::server::shutdown_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    const PROMPT: &str = "> ";

    async fn stream_lines(args: Arguments, emit: Emitter) -> Result<Value, CommandError> {
        for i in (1..=args.integer("from")?).rev() {
            emit.emit(i.to_string()).await;
        }
        Ok(Value::from("liftoff"))
    }

    static FLOODED: AtomicUsize = AtomicUsize::new(0);

    async fn flood(_args: Arguments, emit: Emitter) -> Result<Value, CommandError> {
        for _ in 0..100_000 {
            emit.emit("x".repeat(64)).await;
            FLOODED.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Value::Null)
    }

    fn registry() -> SharedRegistry {
        let registry = Registry::new();
        registry.register(
            CommandDescriptor::new("add", "Add integers", |args, _e| async move {
                let sum = args.integer("a")? + args.optional_integer("b")?.unwrap_or(0);
                Ok::<_, CommandError>(Value::from(sum))
            })
            .param(ParameterSpec::positional("a", "first", ParamParser::integer(None, None)))
            .param(ParameterSpec::named("b", "second", ParamParser::integer(None, None).optional())),
        );
        registry.register(
            CommandDescriptor::new("echo", "Echo text", |args, _e| async move {
                Ok::<_, CommandError>(Value::from(args.text("text")?))
            })
            .param(ParameterSpec::positional("text", "what to echo", ParamParser::text(None, None))),
        );
        registry.register(
            CommandDescriptor::new("countdown", "Count down", stream_lines)
                .param(ParameterSpec::positional("from", "start", ParamParser::integer(Some(1), None))),
        );
        registry.register(CommandDescriptor::new("info", "Structured", |_a, _e| async {
            Ok::<_, CommandError>(serde_json::json!({"ok": true}))
        }));
        registry.register(CommandDescriptor::new("nothing", "Returns null", |_a, _e| async {
            Ok::<_, CommandError>(Value::Null)
        }));
        registry.register(CommandDescriptor::new("flood", "Emits without pause", flood));
        registry.register(CommandDescriptor::new("fail", "Always fails", |_a, _e| async {
            Err::<Value, _>(CommandError::new("it broke"))
        }));
        Arc::new(registry)
    }

    struct Client {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        /// Read until the next prompt, returning everything before it.
        async fn until_prompt(&mut self) -> String {
            let mut out = Vec::new();
            while !out.ends_with(PROMPT.as_bytes()) {
                out.push(self.reader.read_u8().await.expect("connection closed early"));
            }
            out.truncate(out.len() - PROMPT.len());
            String::from_utf8(out).unwrap()
        }

        async fn send(&mut self, line: &str) -> String {
            self.writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
            self.until_prompt().await
        }

        async fn rest(&mut self) -> String {
            let mut out = String::new();
            self.reader.read_to_string(&mut out).await.unwrap();
            out
        }
    }

    fn start_with(settings: ShellSettings) -> (Client, tokio::task::JoinHandle<io::Result<()>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (trigger, signal) = shutdown_channel();
        let handle = tokio::spawn(async move {
            // Dropping the trigger would end the session.
            let _trigger = trigger;
            run_session(server, registry(), Arc::new(settings), signal, "test".into()).await
        });
        let (read, writer) = tokio::io::split(client);
        (
            Client {
                reader: BufReader::new(read),
                writer,
            },
            handle,
        )
    }

    async fn connect() -> Client {
        let (mut client, _handle) = start_with(ShellSettings::default());
        let banner = client.until_prompt().await;
        assert!(banner.contains("help"));
        client
    }

    #[tokio::test]
    async fn banner_precedes_the_first_prompt() {
        let settings = ShellSettings {
            banner: "hi there".into(),
            ..ShellSettings::default()
        };
        let (mut client, _handle) = start_with(settings);
        assert_eq!(client.until_prompt().await, "hi there\n");
    }

    #[tokio::test]
    async fn empty_line_just_reprompts() {
        let mut client = connect().await;
        assert_eq!(client.send("").await, "");
        assert_eq!(client.send("   ").await, "");
    }

    #[tokio::test]
    async fn flags_and_quoted_positionals_combine() {
        let mut client = connect().await;
        assert_eq!(client.send(r#"add "5" --b=10"#).await, "15\n");
        assert_eq!(client.send("add 5 --b 2").await, "7\n");
        assert_eq!(client.send("add 5").await, "5\n");
    }

    #[tokio::test]
    async fn undeclared_flags_leave_their_value_positional() {
        let mut client = connect().await;
        assert_eq!(client.send("echo --loud hi").await, "hi\n");
        assert_eq!(client.send("add 5 --loud --b 2").await, "7\n");
    }

    #[tokio::test]
    async fn string_results_are_written_verbatim() {
        let mut client = connect().await;
        assert_eq!(client.send(r#"echo "hello world""#).await, "hello world\n");
    }

    // Tokens beyond the declared positional slots are dropped silently.
    #[tokio::test]
    async fn surplus_tokens_are_ignored() {
        let mut client = connect().await;
        assert_eq!(client.send("echo one two three").await, "one\n");
    }

    #[tokio::test]
    async fn structured_results_are_pretty_printed() {
        let mut client = connect().await;
        assert_eq!(client.send("info").await, "{\n  \"ok\": true\n}\n");
    }

    #[tokio::test]
    async fn null_results_are_printed() {
        let mut client = connect().await;
        assert_eq!(client.send("nothing").await, "null\n");
    }

    #[tokio::test]
    async fn unread_output_stalls_the_emitting_command() {
        let (client, server) = tokio::io::duplex(64);
        let (trigger, signal) = shutdown_channel();
        let handle = tokio::spawn(run_session(
            server,
            registry(),
            Arc::new(ShellSettings::default()),
            signal,
            "test".into(),
        ));
        let (_read, mut writer) = tokio::io::split(client);
        writer.write_all(b"flood\n").await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        let emitted = FLOODED.load(Ordering::SeqCst);
        assert!(emitted > 0);
        assert!(emitted <= OUTPUT_QUEUE + 8, "{emitted} lines queued for a peer that never reads");

        handle.abort();
        drop(trigger);
    }

    #[tokio::test]
    async fn emitted_lines_stream_before_the_result() {
        let mut client = connect().await;
        assert_eq!(client.send("countdown 3").await, "3\n2\n1\nliftoff\n");
    }

    #[tokio::test]
    async fn unknown_command_uses_fixed_text() {
        let mut client = connect().await;
        assert_eq!(client.send("nope").await, format!("{UNKNOWN_COMMAND_TEXT}\n"));
    }

    #[tokio::test]
    async fn parameter_errors_include_command_help() {
        let mut client = connect().await;
        let reply = client.send("add x").await;
        assert!(reply.starts_with("Error: Parsing parameter 'a': 'x' is not a valid integer\n"));
        assert!(reply.contains("Usage: add <a>"));
        assert!(reply.contains("  --b : second"));
    }

    #[tokio::test]
    async fn execution_errors_are_prefixed() {
        let mut client = connect().await;
        assert_eq!(client.send("fail").await, "Error: it broke\n");
    }

    #[tokio::test]
    async fn help_lists_and_describes_commands() {
        let mut client = connect().await;
        let general = client.send("help").await;
        assert!(general.starts_with("Available commands:\n  add : Add integers\n"));

        let detail = client.send("help add").await;
        assert!(detail.starts_with("add : Add integers\nUsage: add <a>\n"));

        assert_eq!(client.send("help nonsense").await, general);
    }

    #[tokio::test]
    async fn overlong_line_closes_the_connection() {
        let settings = ShellSettings {
            max_line_bytes: 16,
            ..ShellSettings::default()
        };
        let (mut client, handle) = start_with(settings);
        client.until_prompt().await;
        client
            .writer
            .write_all(format!("echo {}\n", "x".repeat(64)).as_bytes())
            .await
            .unwrap();
        assert_eq!(client.rest().await, "Error: input line exceeds 16 bytes\n");
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn shutdown_ends_an_idle_session() {
        let (client, server) = tokio::io::duplex(1024);
        let (trigger, signal) = shutdown_channel();
        let handle = tokio::spawn(run_session(
            server,
            registry(),
            Arc::new(ShellSettings::default()),
            signal,
            "test".into(),
        ));
        trigger.trigger();
        assert!(handle.await.unwrap().is_ok());
        drop(client);
    }

    #[tokio::test]
    async fn read_line_handles_limits_and_terminators() {
        let mut input: &[u8] = b"ok\r\nexactly8\ntoolong!!\nlast";
        assert_eq!(read_line(&mut input, 8).await.unwrap(), LineRead::Line("ok".into()));
        assert_eq!(read_line(&mut input, 8).await.unwrap(), LineRead::Line("exactly8".into()));
        assert_eq!(read_line(&mut input, 8).await.unwrap(), LineRead::TooLong);
    }

    #[tokio::test]
    async fn read_line_returns_unterminated_tail_then_eof() {
        let mut input: &[u8] = b"tail";
        assert_eq!(read_line(&mut input, 8).await.unwrap(), LineRead::Line("tail".into()));
        assert_eq!(read_line(&mut input, 8).await.unwrap(), LineRead::Eof);
    }
}
