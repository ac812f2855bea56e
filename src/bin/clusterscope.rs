use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use clusterscope::baseline::BaselinePolicy;
use clusterscope::matcher::{Matcher, DEFAULT_THRESHOLD};
use clusterscope::pipeline::{self, CompareOpts, ComparisonMode, DEFAULT_CACHE_CAPACITY};
use clusterscope::store::{self, Drain3Store};
use clusterscope::{report, summary};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::info;

fn init_parallelism(jobs: Option<usize>) {
    static START: Once = Once::new();
    START.call_once(|| {
        let n = jobs.filter(|&n| n > 0).unwrap_or_else(num_cpus::get);
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    });
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser, Debug)]
#[command(name = "clusterscope", version, about = "Compare log-template clusters across test scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare every scenario in a directory of cluster stores against a baseline
    Run {
        /// Directory holding one `<scenario>.json` cluster store per scenario
        dir: PathBuf,
        /// Scenario summary table (default: DIR/results.txt, derived from the stores if absent)
        #[arg(long = "summary")]
        summary_path: Option<PathBuf>,
        /// Force this scenario as baseline instead of the one with fewest clusters
        #[arg(long = "baseline")]
        baseline: Option<String>,
        /// Edit distance at or above which a cluster counts as new
        #[arg(long = "threshold", default_value_t = DEFAULT_THRESHOLD)]
        threshold: usize,
        #[arg(long = "mode", value_enum, default_value_t = ComparisonMode::AllPairs)]
        mode: ComparisonMode,
        /// Only compare scenarios matching this regex
        #[arg(long = "match")]
        match_re: Option<String>,
        /// Skip scenarios matching this regex
        #[arg(long = "exclude")]
        exclude_re: Option<String>,
        /// Write the per-cluster comparison trace to this file
        #[arg(long = "trace")]
        trace: Option<PathBuf>,
        /// Write the report to this file as well as stdout
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,
        /// Report format: table | json
        #[arg(long = "format", default_value = "table")]
        format: String,
        /// Neighbour cache size (0 disables)
        #[arg(long = "cache-size", default_value_t = DEFAULT_CACHE_CAPACITY)]
        cache_size: usize,
        /// Worker threads (default: number of CPUs)
        #[arg(long = "jobs", short = 'j')]
        jobs: Option<usize>,
        /// Compare scenarios one after another
        #[arg(long = "sequential", default_value_t = false)]
        sequential: bool,
    },
    /// Compare a single candidate store against a baseline store
    Pair {
        candidate: PathBuf,
        baseline: PathBuf,
        #[arg(long = "threshold", default_value_t = DEFAULT_THRESHOLD)]
        threshold: usize,
    },
    /// Print the scenario summary table computed from a directory of cluster stores
    Summary {
        dir: PathBuf,
        #[arg(long = "output", short = 'o')]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            dir,
            summary_path,
            baseline,
            threshold,
            mode,
            match_re,
            exclude_re,
            trace,
            output,
            format,
            cache_size,
            jobs,
            sequential,
        } => {
            init_parallelism(jobs);
            let opts = CompareOpts {
                baseline: baseline.map(BaselinePolicy::Named).unwrap_or_default(),
                threshold,
                mode,
                include: compile_filter(match_re.as_deref())?,
                exclude: compile_filter(exclude_re.as_deref())?,
                cache_capacity: cache_size,
                trace: trace.is_some(),
                parallel: !sequential,
            };
            run_compare(&dir, summary_path.as_deref(), &opts, trace.as_deref(), output.as_deref(), &format)
        }
        Command::Pair { candidate, baseline, threshold } => run_pair(&candidate, &baseline, threshold),
        Command::Summary { dir, output } => run_summary(&dir, output.as_deref()),
    }
}

fn compile_filter(re: Option<&str>) -> anyhow::Result<Option<Regex>> {
    re.map(|r| Regex::new(r).with_context(|| format!("invalid scenario filter '{r}'")))
        .transpose()
}

fn load_summaries(store: &Drain3Store, summary_path: Option<&Path>) -> anyhow::Result<Vec<summary::ScenarioSummary>> {
    if let Some(path) = summary_path {
        return summary::read_table(path).with_context(|| format!("reading summary table {}", path.display()));
    }
    let default_path = store.dir().join("results.txt");
    if default_path.is_file() {
        return summary::read_table(&default_path)
            .with_context(|| format!("reading summary table {}", default_path.display()));
    }
    info!(dir = %store.dir().display(), "no summary table, deriving cluster counts from the stores");
    let derived = summary::derive_from_store(store).context("deriving scenario summary")?;
    Ok(derived.rows)
}

fn run_compare(
    dir: &Path,
    summary_path: Option<&Path>,
    opts: &CompareOpts,
    trace: Option<&Path>,
    output: Option<&Path>,
    format: &str,
) -> anyhow::Result<()> {
    let store = Drain3Store::new(dir);
    let summaries = load_summaries(&store, summary_path)?;
    let outcome = pipeline::run(&store, &summaries, opts)?;

    if let Some(path) = trace {
        report::write_report(path, &report::render_trace(&outcome))?;
        info!(path = %path.display(), "trace written");
    }

    let rendered = match format {
        "json" => report::render_json(&outcome)?,
        "table" => report::render_table(&outcome),
        other => bail!("unknown format '{other}' (expected table or json)"),
    };
    print!("{rendered}");
    if let Some(path) = output {
        report::write_report(path, &rendered)?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn run_pair(candidate: &Path, baseline: &Path, threshold: usize) -> anyhow::Result<()> {
    // Full paths keep the two scenario names distinct even when the file names agree.
    let candidate_name = candidate.display().to_string();
    let baseline_name = baseline.display().to_string();
    if store::same_store(candidate, baseline) {
        bail!("candidate and baseline are the same store: {candidate_name}");
    }
    let baseline_set = store::load_file(baseline, &baseline_name)?;
    if baseline_set.is_empty() {
        bail!("baseline store {baseline_name} has no clusters");
    }
    let candidate_set = store::load_file(candidate, &candidate_name)?;
    let matcher = Matcher::new(&baseline_set, threshold);
    let cmp = pipeline::compare_set(&matcher, &candidate_set, true)?;
    print!("{}", cmp.trace.unwrap_or_default());
    info!(
        candidate = %store::scenario_name(candidate).unwrap_or(candidate_name),
        baseline = matcher.baseline().scenario(),
        threshold = matcher.threshold(),
        clusters = cmp.report.cluster_count,
        new = cmp.report.new_cluster_count,
        "pair compared"
    );
    Ok(())
}

fn run_summary(dir: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let store = Drain3Store::new(dir);
    let derived = summary::derive_from_store(&store).context("deriving scenario summary")?;
    let table = summary::render_table(&derived.rows);
    print!("{table}");
    if let Some(path) = output {
        report::write_report(path, &table)?;
    }
    Ok(())
}
