//! `unidl get <url>` – run one job end to end and render its progress.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, oneshot};
use unidl_core::config::UnidlConfig;
use unidl_core::engine::SimulatedEngine;
use unidl_core::notify::Update;
use unidl_core::orchestrator::{Orchestrator, OrchestratorError, OrchestratorEvent};
use unidl_core::platform::Platform;
use unidl_core::store::{Format, JobId, JobInput, JobStatus, SqliteJobStore};

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone)]
pub struct GetArgs {
    pub url: String,
    pub platform: Option<Platform>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub playlist: bool,
    pub fail_with: Option<String>,
}

pub async fn run_get(store: &SqliteJobStore, cfg: &UnidlConfig, args: GetArgs) -> Result<()> {
    let output = args.output.as_deref().unwrap_or(&cfg.output_dir);
    let mut input = JobInput::detect(&args.url, output);
    input.platform = pick_platform(args.platform, input.platform, cfg.default_platform);
    input.is_playlist_request |= args.playlist;
    println!("{} | {}", input.platform, input.url.trim());

    let mut engine = SimulatedEngine::new(store.clone(), &cfg.engine);
    if let Some(msg) = args.fail_with {
        engine = engine.with_failure(msg);
    }
    // The engine works on exactly the job this run created.
    let (job_tx, job_rx) = oneshot::channel::<JobId>();
    let worker = tokio::spawn(async move {
        let Ok(job_id) = job_rx.await else {
            return;
        };
        match engine.run_job(job_id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id, "simulated engine could not claim job"),
            Err(e) => tracing::error!(job_id, "simulated engine stopped: {:#}", e),
        }
    });

    let (orch, events) = Orchestrator::with_config(Arc::new(store.clone()), cfg);
    let mut presenter = tokio::spawn(present(
        orch.clone(),
        events,
        job_tx,
        args.format,
        cfg.preferred_resolution.clone(),
    ));

    let job = orch.start(input);
    tokio::pin!(job);
    let result = tokio::select! {
        biased;
        r = &mut job => r,
        // The presenter only ends first when it gave up on input.
        p = &mut presenter => {
            worker.abort();
            p??;
            anyhow::bail!("presenter stopped before the job finished");
        }
    };
    worker.abort();

    match &result {
        Ok(_) | Err(OrchestratorError::JobFailed { .. }) => {
            // Terminal event was sent; let the presenter print everything before it.
            presenter.await??;
        }
        Err(_) => presenter.abort(),
    }

    let outcome = result?;
    match outcome.full_path {
        Some(path) => println!("Saved to {}", path.display()),
        None => println!("Download finished."),
    }
    Ok(())
}

/// Explicit flag, else the detected platform, else the configured default.
fn pick_platform(flag: Option<Platform>, detected: Platform, default: Option<Platform>) -> Platform {
    match (flag, detected, default) {
        (Some(p), _, _) => p,
        (None, Platform::Universal, Some(d)) => d,
        (None, detected, _) => detected,
    }
}

/// Render events until the job's terminal event, prompting when the picker opens.
/// The first event's job id is handed to the engine through `job_tx`.
async fn present(
    orch: Orchestrator,
    mut events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    job_tx: oneshot::Sender<JobId>,
    preset: Option<String>,
    preferred: String,
) -> Result<()> {
    let mut view = View::default();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut job_tx = Some(job_tx);

    while let Some(ev) = events.recv().await {
        if let Some(tx) = job_tx.take() {
            let _ = tx.send(ev.job_id());
        }
        if ev.is_terminal() {
            view.finish_bar();
            break;
        }
        match ev {
            OrchestratorEvent::Update(u) => view.render(&u),
            OrchestratorEvent::ShowPicker { formats, .. } => {
                print_formats(&formats);
                choose(&orch, &formats, preset.as_deref(), &preferred, &mut stdin).await?;
            }
            OrchestratorEvent::Finished { .. } | OrchestratorEvent::Failed { .. } => {}
        }
    }
    Ok(())
}

/// Submit a selection, from `preset` first and then from stdin.
///
/// On end of input the default format is used so the job can still finish.
async fn choose(
    orch: &Orchestrator,
    formats: &[Format],
    preset: Option<&str>,
    preferred: &str,
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let default_id = default_format(formats, preferred).map(|f| f.format_id.clone());
    let mut pending = preset.map(str::to_string);
    let mut eof = false;

    loop {
        let format_id = match pending.take() {
            Some(id) => id,
            None if eof => match default_id.clone() {
                Some(id) => id,
                None => return Ok(()),
            },
            None => {
                print!(
                    "Choose format [{}]: ",
                    default_id.as_deref().unwrap_or("number or id")
                );
                std::io::stdout().flush()?;
                match stdin.next_line().await? {
                    Some(line) => match resolve_choice(&line, formats, default_id.as_deref()) {
                        Some(id) => id,
                        None => {
                            println!("Not an offered format: {}", line.trim());
                            continue;
                        }
                    },
                    None => {
                        eof = true;
                        continue;
                    }
                }
            }
        };

        match orch.submit_selection(&format_id).await {
            Ok(()) => return Ok(()),
            Err(e @ OrchestratorError::UnknownFormat(_)) => println!("{e}"),
            // The failure already reached the log; retry from the prompt.
            Err(OrchestratorError::SelectionNotSaved(_)) if !eof => {}
            Err(OrchestratorError::SelectionNotSaved(msg)) => {
                anyhow::bail!("could not save format selection: {msg}")
            }
            Err(OrchestratorError::NoActiveSelection) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_formats(formats: &[Format]) {
    println!("Select quality:");
    for (i, f) in formats.iter().enumerate() {
        println!(
            "  {:>2}) {:<6} {:<8} {:<5} {}{}",
            i + 1,
            f.format_id,
            f.resolution,
            f.container,
            f.size_estimate.as_deref().unwrap_or("-"),
            if f.is_high_quality() { "  [HQ]" } else { "" }
        );
    }
}

/// First format at the preferred resolution, else the first offered.
fn default_format<'a>(formats: &'a [Format], preferred: &str) -> Option<&'a Format> {
    formats
        .iter()
        .find(|f| f.resolution.eq_ignore_ascii_case(preferred))
        .or_else(|| formats.first())
}

/// Map a prompt answer to a format id: empty is the default, `N` is the
/// N-th listed format, anything else must be an offered id.
fn resolve_choice(answer: &str, formats: &[Format], default_id: Option<&str>) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return default_id.map(str::to_string);
    }
    if let Some(f) = formats.iter().find(|f| f.format_id == answer) {
        return Some(f.format_id.clone());
    }
    match answer.parse::<usize>() {
        Ok(n) if (1..=formats.len()).contains(&n) => Some(formats[n - 1].format_id.clone()),
        _ => None,
    }
}

fn progress_bar(pct: f64, width: usize) -> String {
    let pct = pct.clamp(0.0, 100.0);
    let filled = ((pct / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}] {:>5.1}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        pct
    )
}

/// Last values printed, so repeated updates don't repeat output.
#[derive(Default)]
struct View {
    status: Option<JobStatus>,
    log: Option<String>,
    progress: Option<f64>,
    bar_open: bool,
}

impl View {
    fn render(&mut self, u: &Update) {
        if let Some(status) = u.status {
            if self.status != Some(status) {
                self.finish_bar();
                println!("status: {}", status.as_str());
                self.status = Some(status);
            }
        }
        if u.log_line.is_some() && u.log_line != self.log {
            self.finish_bar();
            if let Some(ref line) = u.log_line {
                println!("  {line}");
            }
            self.log = u.log_line.clone();
        }
        if let Some(pct) = u.progress_percent {
            if self.progress != Some(pct) && self.status == Some(JobStatus::Downloading) {
                print!("\r{}", progress_bar(pct, BAR_WIDTH));
                let _ = std::io::stdout().flush();
                self.bar_open = true;
                self.progress = Some(pct);
            }
        }
    }

    fn finish_bar(&mut self) {
        if self.bar_open {
            println!();
            self.bar_open = false;
        }
    }
}
