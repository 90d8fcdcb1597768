
// imports
use crate::config::Config;
use crate::train::TrainingController;

use std::env;
use std::error::Error;
use std::time::Instant;
use log::info;

pub struct Pipeline {}

impl Pipeline {

    // runs the training procedure -
    // -> configuration of arguments
    // -> vocabulary, initialization and epochs (resuming from a checkpoint if one is there)
    // -> the snapshot is left in the output directory

    pub fn run() -> Result<(), Box<dyn Error>> {

        info!("entering program...");
        let args: Vec<String> = env::args().collect();

        info!("building parameters...");
        let params = Config::new(&args)?.get_params();

        let timer = Instant::now();
        info!("starting training part...");
        let summary = TrainingController::new(params.clone()).train()?;

        info!("finished training after epoch {}, saved vecs to {}. Took {} seconds ...",
            summary.resumed_from + summary.epochs_run, params.snapshot_path().display(), timer.elapsed().as_secs());
        Ok(())
    }

}
