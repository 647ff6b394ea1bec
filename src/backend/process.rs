//! Worker-process pool
//!
//! N child processes of the current executable do the fetching; only the
//! coordinator process ever touches the site model. Each child is fed one
//! JSON-encoded [`WorkItem`] per line on stdin and answers with one
//! [`PageVisit`] per line on stdout, with the shared [`WorkerConfig`] sent
//! once as a handshake. A dispatcher thread per child runs the same
//! claim/record loop as the thread backend; "fetch" just means a round
//! trip over the pipes. Pipe failures are fatal to the whole run.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, Command, Stdio};

use crate::crawler::frontier::{SharedState, WorkItem};
use crate::crawler::worker::{apply_visit, visit_item, PageVisit, WorkerConfig};
use crate::crawler::{make_parser, Fetcher};
use crate::{LinkProbeError, Result};

/// The hidden flag that turns an invocation of this binary into a worker
pub const WORKER_FLAG: &str = "--worker-process";

pub fn run(shared: &SharedState, config: &WorkerConfig, workers: usize) -> Result<()> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|id| scope.spawn(move || dispatcher_loop(shared, config, id)))
            .collect();

        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(LinkProbeError::WorkerPanicked);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

/// Feeds one child process until the frontier is drained
///
/// Any pipe or protocol failure aborts the whole run: the shared state is
/// flipped to done so the sibling dispatchers drain their current item and
/// exit, and the error propagates out of `run()`.
fn dispatcher_loop(shared: &SharedState, config: &WorkerConfig, id: usize) -> Result<()> {
    let mut worker = match WorkerProcess::spawn(config) {
        Ok(worker) => worker,
        Err(e) => {
            shared.abort();
            return Err(e);
        }
    };

    tracing::debug!("worker process {} up (pid {})", id, worker.child.id());

    while let Some(item) = shared.next_item_blocking() {
        match worker.round_trip(&item) {
            Ok(visit) => {
                shared.record_with(|state, ctx| apply_visit(state, visit, ctx));
            }
            Err(e) => {
                // The claimed item would never complete; end the run.
                shared.abort();
                worker.kill();
                return Err(e);
            }
        }
    }

    worker.shutdown();
    tracing::debug!("worker process {} done", id);
    Ok(())
}

/// A spawned child with line-buffered pipes
struct WorkerProcess {
    child: Child,
    stdin: BufWriter<std::process::ChildStdin>,
    stdout: std::io::Lines<BufReader<std::process::ChildStdout>>,
}

impl WorkerProcess {
    fn spawn(config: &WorkerConfig) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let mut child = Command::new(exe)
            .arg(WORKER_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LinkProbeError::WorkerExited("no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LinkProbeError::WorkerExited("no stdout pipe".to_string()))?;

        let mut worker = Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout).lines(),
        };

        // Handshake: the configuration is the first line.
        worker.send_line(&serde_json::to_string(config)?)?;
        Ok(worker)
    }

    /// Ships one item and blocks for its result
    fn round_trip(&mut self, item: &WorkItem) -> Result<PageVisit> {
        self.send_line(&serde_json::to_string(item)?)?;

        match self.stdout.next() {
            Some(Ok(line)) => Ok(serde_json::from_str(&line)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(LinkProbeError::WorkerExited(
                "output pipe closed mid-run".to_string(),
            )),
        }
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Closes stdin so the child sees EOF, then reaps it
    fn shutdown(mut self) {
        drop(self.stdin);
        if let Err(e) = self.child.wait() {
            tracing::warn!("failed to reap worker process: {}", e);
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Entry point of a child process (`linkprobe --worker-process`)
///
/// Reads the configuration line, then answers one visit per item line
/// until stdin reaches EOF. The child is stateless between items apart
/// from its HTTP connection pool.
pub fn worker_process_main() -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let config_line = lines
        .next()
        .ok_or_else(|| LinkProbeError::WorkerExited("missing configuration line".to_string()))??;
    let config: WorkerConfig = serde_json::from_str(&config_line)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let fetcher = Fetcher::new(&config)?;
    let parser = make_parser(config.parser);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let item: WorkItem = serde_json::from_str(&line)?;
        let outcome = runtime.block_on(visit_item(&item, &config, &fetcher, parser.as_ref()));
        let visit = PageVisit { item, outcome };

        serde_json::to_writer(&mut out, &visit)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }

    Ok(())
}
