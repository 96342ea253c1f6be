use super::args::*;
use super::helpers::Workspace;

pub mod doc;
pub mod eval;
pub mod extract;
pub mod workflow;

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let Cli { config, db, cmd } = cli;
    match cmd {
        Command::Extract(args) => extract::run(args),
        Command::Doc(args) => doc::run(args, &Workspace::open(&config, db)?),
        Command::Eval(args) => eval::run(args, &Workspace::open(&config, db)?).await,
        Command::Workflow(args) => workflow::run(args, &Workspace::open(&config, db)?),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
