// Copyright 2021-2024 Fastly, Inc.

use clap::error::ErrorKind;
use clap::{ArgAction, Parser, ValueHint};
use log::*;
use std::io::Write;
use std::path::PathBuf;

use knot_statistics_check::check::{check, CheckConfig};
use knot_statistics_check::compare::Mode;
use knot_statistics_check::report::{Report, ReporterConfig};
use knot_statistics_check::util::CheckError;

/// Check Knot DNS server statistics dumps.
#[derive(Parser, Debug)]
#[clap(version)]
struct Opts {
    /// Path to the statistics dump file
    #[clap(short = 'f',
           long = "file",
           value_name = "FILE",
           value_parser,
           value_hint = ValueHint::FilePath)
    ]
    file: PathBuf,

    /// How query counters are reported
    #[clap(long, value_enum, default_value_t = Mode::Rate)]
    mode: Mode,

    /// File holding the previous statistics dump [default: FILE_last]
    #[clap(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    state_file: Option<PathBuf>,

    /// Report WARNING when the reported query count reaches this value
    #[clap(short, long)]
    warning: Option<f64>,

    /// Report CRITICAL when the reported query count reaches this value
    #[clap(short, long)]
    critical: Option<f64>,

    /// Increase verbosity level
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl From<Opts> for CheckConfig {
    fn from(opts: Opts) -> Self {
        CheckConfig {
            statistics_file: opts.file,
            state_file: opts.state_file,
            mode: opts.mode,
            reporter: ReporterConfig {
                warning_threshold: opts.warning,
                critical_threshold: opts.critical,
            },
        }
    }
}

/// Print the status line and exit with the matching monitoring state.
fn finish(report: Report) -> ! {
    let mut line = report.to_string();
    line.push('\n');
    let _ = std::io::stdout().write_all(line.as_bytes());
    std::process::exit(report.exit_code());
}

fn main() {
    // Workaround for https://github.com/rust-lang/rust/issues/62569
    if cfg!(unix) {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }

    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            kind => {
                let _ = err.print();
                finish(Report::from(&CheckError::Argument(kind.to_string())));
            }
        },
    };

    if let Err(err) = stderrlog::new()
        .verbosity(opts.verbose as usize)
        .module(module_path!())
        .module("knot_statistics_check")
        .init()
    {
        finish(Report::from(&CheckError::Unexpected(err.into())));
    }

    debug!("Options: {:?}", opts);

    finish(check(&CheckConfig::from(opts)));
}
