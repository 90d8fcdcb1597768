use std::{env, error::Error, io::{self, BufRead}, process};
use env_logger::Env;
use log::{error, info};
use sgns_trainer::{files_handling, EmbeddingError, EmbeddingStore, Neighbor, Similarity};


// looks up nearest neighbours in a trained snapshot, treated as binary executable so it
// can be ran independently from training.
// arguments to this executable should be:
// path to the snapshot written by training
// optionally the number of neighbours to print, only the closest one otherwise
// the tokens to look up are read from stdin, one per line. For example:
// echo cat | similar Output/vectors.txt 5

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {

    if args.len() < 2 || args.len() > 3 {
        return Err("usage: similar <snapshot> [k]".into());
    }
    let k = match args.get(2) {
        Some(k) => Some(k.parse::<usize>()?),
        None => None
    };

    let store: EmbeddingStore = files_handling::read_input(&args[1])?;
    info!("loaded {} vectors from {}", store.len(), &args[1]);
    let sim_obj = Similarity::new(&store);

    for line in io::stdin().lock().lines() {
        let line = line?;
        let token = line.trim();
        if token.is_empty() {
            continue;
        }

        match k {
            Some(k) => run_top_k(&sim_obj, token, k)?,
            None => run_nearest(&sim_obj, token)?,
        }
    }
    Ok(())
}

fn run_nearest(sim_obj: &Similarity, token: &str) -> Result<(), Box<dyn Error>> {
    match sim_obj.most_similar(token) {
        Ok(Neighbor::Found(similar, score)) => println!("the word most similar to '{}' is '{}' ({})", token, similar, score),
        Ok(Neighbor::NotFound) => println!("no other word to compare '{}' with", token),
        Err(EmbeddingError::UnknownToken(_)) => println!("unknown token '{}'", token),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn run_top_k(sim_obj: &Similarity, token: &str, k: usize) -> Result<(), Box<dyn Error>> {
    match sim_obj.most_similar_k(token, k) {
        Ok(similarities) => {
            println!("searching {} most similar words to {}", k, token);
            for (i, (similar, score)) in similarities.iter().enumerate() {
                println!("{} : {} ? {} = {}", i, token, similar, score);
            }
            println!();
        },
        Err(EmbeddingError::UnknownToken(_)) => println!("unknown token '{}'", token),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
