mod desktop;
mod modes;
mod report;

use anyhow::{Context, Result};
use btd6_core::constants::{BASE_RESOLUTION, DEFAULT_PLAYTHROUGH_DIRS};
use btd6_core::{
    GameData, JsonDirLoader, JsonFileStore, Persistence, PlanOptions, Planner, ReplayDriver,
    Resolution, Session, ValidationFilter, Vision, status,
};
use clap::{ArgGroup, Parser};
use colored::Colorize;
use log::{LevelFilter, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use desktop::DesktopHost;
use modes::{ModeRequest, normalize_legacy_flags, parse_mode};
use report::{ReportFormat, list_candidates, write_summary};

#[derive(Debug, Parser)]
#[command(name = "btd6-replay", version)]
#[command(about = "Replays recorded BTD6 playthroughs against the running game")]
#[command(group(ArgGroup::new("knowledge").required(true).args(["mk", "no_mk"])))]
struct Args {
    /// Use playthroughs that rely on monkey knowledge (`-mk`)
    #[arg(long)]
    mk: bool,

    /// Only use playthroughs that work without monkey knowledge (`-nomk`)
    #[arg(long)]
    no_mk: bool,

    /// Don't record stats or medals (`-ns`)
    #[arg(long)]
    no_stats: bool,

    /// Keep playing after the first game (`-r`)
    #[arg(short, long)]
    repeat: bool,

    /// List the playthroughs the mode would use and exit (`-l`)
    #[arg(short, long)]
    list: bool,

    /// Also use playthroughs not validated for this resolution (`-nv`)
    #[arg(long)]
    include_unvalidated: bool,

    /// Directory with the static data tables
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Playthrough directories, searched in order
    #[arg(long = "playthrough-dir", default_values_t = DEFAULT_PLAYTHROUGH_DIRS.map(str::to_string))]
    playthrough_dirs: Vec<String>,

    /// Directory holding stats and the user profile
    #[arg(long, default_value = ".")]
    state_dir: PathBuf,

    /// Root of the reference images, one subdirectory per resolution
    #[arg(long, default_value = "images")]
    images_dir: PathBuf,

    /// Screen resolution as WIDTHxHEIGHT, detected when omitted
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Seed for random playthrough selection
    #[arg(long)]
    seed: Option<u64>,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// `<mode> <mode arguments…>`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    words: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_legacy_flags(std::env::args()));
    init_logging(args.verbose);
    let request = parse_mode(&args.words)?;

    if !args.list && !(args.output.is_none() && args.report == ReportFormat::Json) {
        announce_banner();
    }

    let data = GameData::load(&JsonDirLoader::new(&args.data_dir))
        .with_context(|| format!("failed to load data tables from {}", args.data_dir.display()))?;
    let resolution = resolve_resolution(args.resolution);
    let session = Session::new(args.mk, resolution);
    let store = JsonFileStore::new(&args.state_dir, &args.data_dir);
    let profile = store.load_profile().context("failed to load the user profile")?;
    let stats = store.load_stats().context("failed to load playthrough stats")?;
    let areas = data.areas_for(resolution)?;
    let host = DesktopHost::new(&args.images_dir, resolution);

    let options = PlanOptions {
        repeat: args.repeat,
        record_stats: !args.no_stats,
        validation: if args.include_unvalidated {
            ValidationFilter::IncludeAll
        } else {
            ValidationFilter::ExcludeNonValidated
        },
    };
    let dirs = args.playthrough_dirs.iter().map(PathBuf::from).collect();
    let planner = Planner::new(&data, &areas.click, session, &profile, &stats, dirs, options);
    let plan = request.plan(&planner, &host.collection_events())?;

    let mut output_target = OutputTarget::new(args.output.clone())?;
    if args.list {
        list_candidates(output_target.writer(), &plan, request.value_unit())?;
        output_target.flush_inner()?;
        return Ok(());
    }

    if matches!(request, ModeRequest::File { resume: Some(_), .. }) {
        info!("resuming mid-playthrough: stats and medals are not recorded");
    }
    let interrupted = host.interrupt_flag();
    ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
        .context("failed to install the ctrl-c handler")?;
    let seed = args.seed.unwrap_or_else(clock_seed);
    let summary = ReplayDriver::new(host, store, &data, session, plan, seed)?.run();
    status::settle();
    let summary = summary?;

    write_summary(output_target.writer(), &summary, args.report)?;
    output_target.flush_inner()?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            if status::take_pending() {
                writeln!(buf)?;
            }
            writeln!(
                buf,
                "[{}] {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn announce_banner() {
    println!("{}", "🎈 BTD6 Playthrough Replay".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn resolve_resolution(requested: Option<Resolution>) -> Resolution {
    if let Some(resolution) = requested {
        return resolution;
    }
    desktop::screen_resolution().unwrap_or_else(|| {
        warn!("screen resolution unknown, assuming {BASE_RESOLUTION}");
        BASE_RESOLUTION
    })
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            elapsed.as_secs().rotate_left(32) ^ u64::from(elapsed.subsec_nanos())
        })
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}
