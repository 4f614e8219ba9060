use std::time::Duration;
use std::{fs, process};

use adya_core::anomaly::{AnomalyKind, RelsExplainer};
use adya_core::{CheckOptions, CheckResult, Validity};
use adya_cli::{App, Command, GraphInput};
use adya_testgen::GeneratorParams;
use clap::Parser;

fn main() {
    let app = App::parse();
    match &app.command {
        Command::Generate(args) => generate(args),
        Command::Check(args) => check(args),
    }
}

fn generate(args: &adya_cli::GenerateArgs) {
    fs::create_dir_all(&args.output_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output directory: {e}");
        process::exit(1);
    });

    let params = GeneratorParams::builder()
        .key_dist(args.key_dist.into())
        .key_count(args.key_count)
        .build();
    let histories = adya_testgen::generator::generate_mult_histories(args.n_hist, &params, args.n_txn);

    for history in &histories {
        let path = args.output_dir.join(format!("{}.json", history.get_id()));
        let file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", path.display());
            process::exit(1);
        });
        serde_json::to_writer_pretty(file, history).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        });
    }

    println!(
        "Generated {} histories to {}",
        histories.len(),
        args.output_dir.display()
    );
}

fn check(args: &adya_cli::CheckArgs) {
    let file = fs::File::open(&args.input).unwrap_or_else(|e| {
        eprintln!("Failed to open {}: {e}", args.input.display());
        process::exit(1);
    });
    let input: GraphInput = serde_json::from_reader(file).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {e}", args.input.display());
        process::exit(1);
    });
    let (history, analysis) = input.into_parts().unwrap_or_else(|e| {
        eprintln!("Bad input: {e}");
        process::exit(1);
    });

    let anomalies: Vec<AnomalyKind> = args
        .anomalies
        .iter()
        .map(|name| {
            name.parse().unwrap_or_else(|e| {
                eprintln!("{e}");
                process::exit(1);
            })
        })
        .collect();

    let options = CheckOptions::builder()
        .consistency_models(args.consistency_models.iter().map(|m| (*m).into()).collect())
        .anomalies(anomalies)
        .cycle_search_timeout(Duration::from_millis(args.cycle_search_timeout))
        .build();

    let result = adya_core::check(&options, &history, &analysis, &RelsExplainer);

    if args.json {
        serde_json::to_writer_pretty(std::io::stdout().lock(), &result).unwrap_or_else(|e| {
            eprintln!("Failed to write result: {e}");
            process::exit(1);
        });
        println!();
    } else {
        render(&result);
    }

    if matches!(result.valid, Validity::Invalid) {
        process::exit(1);
    }
}

fn render(result: &CheckResult<String, i64>) {
    println!("valid: {}", result.valid);
    if !result.not.is_empty() {
        let not: Vec<&str> = result.not.iter().map(|m| m.name()).collect();
        println!("not: {}", not.join(", "));
    }
    if !result.also_not.is_empty() {
        let also: Vec<&str> = result.also_not.iter().map(|m| m.name()).collect();
        println!("also not: {}", also.join(", "));
    }
    for (kind, anomalies) in &result.anomalies {
        println!("{kind} ({}):", anomalies.len());
        for anomaly in anomalies {
            match anomaly {
                adya_core::Anomaly::Cycle(explanation) => print!("{explanation}"),
                other => println!("  {other:?}"),
            }
        }
    }
}
