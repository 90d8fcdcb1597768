use env_logger::Env;
use log::error;
use sgns_trainer::Pipeline;
use std::process;

// usage: sgns_trainer <params.json>
// see config.rs for the keys the json file accepts

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = Pipeline::run() {
        error!("{}", e);
        process::exit(1);
    }
}
