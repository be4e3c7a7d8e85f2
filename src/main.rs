mod archiver;
mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;

fn main() {
    env_loader::load_dotenv();
    logging::init();
    env_loader::warn_unknown_env_keys();

    if let Err(err) = cli::run() {
        let code = error::ArchiverErrorCode::classify(&err);
        eprintln!("error[{}]: {err:#}", code.as_str());
        std::process::exit(1);
    }
}
