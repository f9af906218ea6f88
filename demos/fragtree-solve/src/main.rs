//! Compute the fragmentation trees for one or more roots of a fragmentation graph
use std::{fs::File, io::BufWriter};

use clap::Parser;
use mzfragtree::{BuilderSettings, FragmentationGraph, FragmentationTree, Strategy, TreeBuilder};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The fragmentation graph in JSON
    #[arg(short, long)]
    graph: String,
    /// The roots to solve, defaults to the flagged root or all nodes without incoming edges
    #[arg(short, long, value_delimiter = ',')]
    roots: Vec<usize>,
    /// Only report trees that reach this score
    #[arg(short, long, default_value_t = f64::NEG_INFINITY, allow_negative_numbers = true)]
    lower_bound: f64,
    /// The maximal number of working colors, overrides the settings file
    #[arg(long)]
    max_colors: Option<usize>,
    /// Use the greedy heuristic instead of the exact solver
    #[arg(long)]
    greedy: bool,
    /// The builder settings in JSON
    #[arg(long)]
    settings: Option<String>,
    /// Where to store the results as JSON, if not given the trees are shown on stdout
    #[arg(short, long)]
    out: Option<String>,
}

#[derive(Debug, Serialize)]
struct RootResult {
    root: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<FragmentationTree>,
    below_bound: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn read(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("Could not read file '{path}': {err}");
        std::process::exit(2)
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fragtree_solve=info,mzfragtree=info".into()),
        )
        .with_target(false)
        .init();
    let args = Cli::parse();

    let graph = FragmentationGraph::from_json(&read(&args.graph)).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(2)
    });
    let mut settings = args.settings.as_deref().map_or_else(BuilderSettings::default, |path| {
        BuilderSettings::from_json(&read(path)).unwrap_or_else(|err| {
            eprintln!("{err}");
            std::process::exit(2)
        })
    });
    if let Some(max_colors) = args.max_colors {
        settings.max_colors = max_colors;
    }
    let strategy = if args.greedy {
        Strategy::Greedy
    } else {
        Strategy::DynamicProgramming
    };
    let builder = TreeBuilder::new(strategy, settings).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(2)
    });
    let roots = if args.roots.is_empty() {
        graph
            .root()
            .map_or_else(|| graph.sources().collect(), |root| vec![root])
    } else {
        args.roots
    };
    tracing::info!(
        nodes = graph.len(),
        edges = graph.edges().len(),
        roots = roots.len(),
        %strategy,
        "Loaded fragmentation graph"
    );

    let prepared = builder
        .prepare(&graph, args.lower_bound)
        .unwrap_or_else(|err| {
            eprintln!("{err}");
            std::process::exit(2)
        });
    if prepared.is_reduced() {
        tracing::warn!(
            distinct = prepared.reduction().distinct_colors(),
            working = prepared.reduction().working_colors(),
            "Too many colors, trees are not guaranteed to be optimal"
        );
    }
    let results = builder
        .par_build_all(&graph, &roots, args.lower_bound, &prepared)
        .into_iter()
        .map(|(root, result)| match result {
            Ok(outcome) => RootResult {
                root,
                below_bound: outcome.is_below_bound(),
                tree: outcome.into_tree(),
                error: None,
            },
            Err(err) => {
                tracing::warn!(root, "Could not build tree: {err}");
                RootResult {
                    root,
                    tree: None,
                    below_bound: false,
                    error: Some(err.to_string()),
                }
            }
        })
        .collect::<Vec<_>>();
    tracing::info!(
        found = results.iter().filter(|r| r.tree.is_some()).count(),
        below_bound = results.iter().filter(|r| r.below_bound).count(),
        "Solved all roots"
    );

    if let Some(out) = args.out {
        let file = BufWriter::new(File::create(&out).unwrap_or_else(|err| {
            eprintln!("Could not create file '{out}': {err}");
            std::process::exit(2)
        }));
        serde_json::to_writer_pretty(file, &results).unwrap_or_else(|err| {
            eprintln!("Could not write results: {err}");
            std::process::exit(2)
        });
    } else {
        for result in &results {
            match (&result.tree, &result.error) {
                (Some(tree), _) => print!("{}", tree.display(&graph)),
                (None, Some(error)) => println!("{}: {error}", result.root),
                (None, None) => println!("{}: below the lower bound", result.root),
            }
        }
    }
}
