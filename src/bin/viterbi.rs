use itertools::Itertools;
use ndarray::Array1;
use trellis::input::ModelFile;

use std::env;
use std::process;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <input_file>", args[0]);
        process::exit(1);
    }

    let started = Instant::now();
    match decode(&args[1]) {
        Ok(path) => {
            println!("Most probable hidden states are:");
            println!("{}", path.iter().join(" "));
        }
        Err(err) => {
            eprintln!("ERROR: {}", err);
            process::exit(1);
        }
    }
    println!("total time {:.4}", started.elapsed().as_secs_f64());
}

fn decode(path: &str) -> trellis::Result<Array1<i64>> {
    let model = ModelFile::from_path(path)?;
    model.hmm.most_likely_sequence(&model.observations)
}
