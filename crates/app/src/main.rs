use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use attend_core::model::{
    ReportSet, ReportSnapshot, RosterEntry, SessionDraft, SessionId, StudentStats,
};
use backend::{AttendanceBackend, BackendError, HttpBackend, HttpBackendConfig, InMemoryBackend};
use services::{Clock, Dashboard, DashboardConfig, RetryPolicy, VisibleView};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ui::{map_dashboard, render_dashboard};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidSessionId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --session value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- session --subject <name> --classroom <room>");
    eprintln!("                             [--export <path>]");
    eprintln!("  cargo run -p app -- reports [--watch]");
    eprintln!("  cargo run -p app -- export --session <id> [--out <path>]");
    eprintln!("  cargo run -p app -- demo");
    eprintln!();
    eprintln!("Press Ctrl-C while a QR code is shown to close it early.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ATTEND_API_URL, ATTEND_TOKEN");
    eprintln!("  ATTEND_QR_VALIDITY_SECS, ATTEND_POLL_INTERVAL_SECS, ATTEND_ROSTER_SETTLE_MS");
    eprintln!("  ATTEND_RETRY_ATTEMPTS, ATTEND_RETRY_DELAY_MS");
    eprintln!("  RUST_LOG (default: info)");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Session {
        subject: String,
        classroom: String,
        export: Option<PathBuf>,
    },
    Reports {
        watch: bool,
    },
    Export {
        session: SessionId,
        out: Option<PathBuf>,
    },
    Demo,
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(first) = args.next() else {
            return Ok(None);
        };
        let command = match first.as_str() {
            "--help" | "-h" => return Ok(None),
            "session" => Self::parse_session(&mut args)?,
            "reports" => Self::parse_reports(&mut args)?,
            "export" => Self::parse_export(&mut args)?,
            "demo" => Self::Demo,
            _ => return Err(ArgsError::UnknownArg(first)),
        };
        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(Some(command))
    }

    fn parse_session(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut subject = None;
        let mut classroom = None;
        let mut export = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--subject" => subject = Some(require_value(args, "--subject")?),
                "--classroom" => classroom = Some(require_value(args, "--classroom")?),
                "--export" => export = Some(PathBuf::from(require_value(args, "--export")?)),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        // Blank values are caught by session validation, not here.
        Ok(Self::Session {
            subject: subject.ok_or(ArgsError::MissingFlag { flag: "--subject" })?,
            classroom: classroom.ok_or(ArgsError::MissingFlag { flag: "--classroom" })?,
            export,
        })
    }

    fn parse_reports(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut watch = false;
        for arg in args {
            match arg.as_str() {
                "--watch" => watch = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(Self::Reports { watch })
    }

    fn parse_export(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut session = None;
        let mut out = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--session" => {
                    let raw = require_value(args, "--session")?;
                    let id = raw
                        .parse::<SessionId>()
                        .map_err(|_| ArgsError::InvalidSessionId { raw: raw.clone() })?;
                    session = Some(id);
                }
                "--out" => out = Some(PathBuf::from(require_value(args, "--out")?)),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(Self::Export {
            session: session.ok_or(ArgsError::MissingFlag { flag: "--session" })?,
            out,
        })
    }
}

fn init_tracing() {
    // Logs go to stderr so rendered frames on stdout stay readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn http_backend() -> Result<Arc<dyn AttendanceBackend>, Box<dyn std::error::Error>> {
    let config = HttpBackendConfig::from_env()?;
    info!(base_url = %config.base_url, "using attendance server");
    Ok(Arc::new(HttpBackend::new(config)?))
}

/// Prints a frame only when it differs from the previous one.
#[derive(Default)]
struct FramePrinter {
    last: String,
}

impl FramePrinter {
    fn print(&mut self, dashboard: &Dashboard) {
        let frame = render_dashboard(&map_dashboard(dashboard));
        if frame != self.last && !frame.is_empty() {
            println!("{frame}");
            self.last = frame;
        }
    }
}

/// Run one session from creation until its roster is shown.
async fn drive_session(
    dashboard: &mut Dashboard,
    draft: SessionDraft,
) -> Result<SessionId, Box<dyn std::error::Error>> {
    dashboard.create_session(draft)?;

    let mut printer = FramePrinter::default();
    let mut frame = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            Some(event) = dashboard.next_event() => dashboard.handle(event),
            _ = frame.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                if dashboard.visible_view() == VisibleView::Qr {
                    info!("closing QR view early");
                    dashboard.close_qr_view();
                } else {
                    return Err("interrupted".into());
                }
            }
        }
        printer.print(dashboard);

        if !dashboard.is_creating() && dashboard.session().is_none() {
            let message = dashboard
                .notices()
                .current_error()
                .map_or_else(|| "session was not created".to_string(), |e| e.message.clone());
            return Err(message.into());
        }
        if dashboard.visible_view() == VisibleView::Roster {
            if let Some(session) = dashboard.session() {
                return Ok(session.id().clone());
            }
        }
    }
}

async fn export_to(
    dashboard: &mut Dashboard,
    session: &SessionId,
    out: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let report = dashboard.export_session(session).await?;
    let path = match out {
        Some(path) if path.is_dir() => path.join(&report.file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(&report.file_name),
    };
    std::fs::write(&path, &report.bytes)?;
    info!(path = %path.display(), bytes = report.bytes.len(), "export written");
    Ok(path)
}

async fn watch_reports(dashboard: &mut Dashboard, watch: bool) {
    let mut printer = FramePrinter::default();
    dashboard.activate_polling();
    loop {
        tokio::select! {
            Some(event) = dashboard.next_event() => dashboard.handle(event),
            _ = tokio::signal::ctrl_c() => break,
        }
        printer.print(dashboard);
        let settled = dashboard.report_sync().last_updated().is_some()
            || dashboard.notices().current_error().is_some();
        if !watch && settled && !dashboard.report_sync().is_polling() {
            break;
        }
    }
    dashboard.deactivate_polling();
}

fn demo_reports(count: u32) -> ReportSet {
    let mut students = BTreeMap::new();
    for (id, name, attended) in [("s-001", "Ada Lovelace", count), ("s-002", "Alan Turing", 1)] {
        students.insert(
            id.to_string(),
            StudentStats {
                name: name.to_string(),
                email: format!("{id}@campus.example"),
                attendance_count: attended,
                attendance_percentage: None,
            },
        );
    }
    ReportSet::from_snapshots([ReportSnapshot::new("Math", 4, students)])
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let backend = InMemoryBackend::new();
    backend.set_reports(demo_reports(2));
    // One transient failure so the roster fetch shows a retry.
    backend.push_roster_fault(BackendError::Server {
        status: 503,
        message: None,
    });

    let config = DashboardConfig::default()
        .with_qr_validity(Duration::from_secs(5))
        .with_poll_interval(Duration::from_secs(2))
        .with_roster_settle_delay(Duration::from_millis(500))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(500)));
    let mut dashboard = Dashboard::new(Arc::new(backend.clone()), config, Clock::system());
    dashboard.activate_polling();

    let demo_backend = backend.clone();
    let scans = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Some(id) = demo_backend.session_ids().into_iter().next() {
            let _ = demo_backend.record_attendance(
                &id,
                RosterEntry {
                    student_id: "s-001".into(),
                    name: "Ada Lovelace".into(),
                    email: "s-001@campus.example".into(),
                },
            );
            demo_backend.set_reports(demo_reports(3));
        }
    });

    let session = drive_session(&mut dashboard, SessionDraft::new("Math", "Room 101")).await?;
    let _ = scans.await;

    let report = dashboard.export_session(&session).await?;
    println!("Export {} ({} bytes)", report.file_name, report.bytes.len());

    dashboard.close_roster_view();
    if dashboard.select_report("Math") {
        println!("{}", render_dashboard(&map_dashboard(&dashboard)));
    }
    dashboard.deactivate_polling();
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let command = Command::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let Some(command) = command else {
        print_usage();
        return Ok(());
    };

    init_tracing();

    match command {
        Command::Session {
            subject,
            classroom,
            export,
        } => {
            let mut dashboard =
                Dashboard::new(http_backend()?, DashboardConfig::from_env(), Clock::system());
            let session =
                drive_session(&mut dashboard, SessionDraft::new(subject, classroom)).await?;
            if let Some(out) = export {
                let path = export_to(&mut dashboard, &session, Some(&out)).await?;
                println!("Saved {}", path.display());
            }
            Ok(())
        }
        Command::Reports { watch } => {
            let mut dashboard =
                Dashboard::new(http_backend()?, DashboardConfig::from_env(), Clock::system());
            watch_reports(&mut dashboard, watch).await;
            match dashboard.notices().current_error() {
                Some(err) if dashboard.reports().is_none() => Err(err.clone().into()),
                _ => Ok(()),
            }
        }
        Command::Export { session, out } => {
            let mut dashboard =
                Dashboard::new(http_backend()?, DashboardConfig::from_env(), Clock::system());
            let path = export_to(&mut dashboard, &session, out.as_deref()).await?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Command::Demo => run_demo().await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
