mod args;
mod commands;
mod output;

fn main() {
    env_logger::init();

    if let Err(err) = real_main() {
        output::print_error(&err);
        std::process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    use clap::Parser as _;

    let cli = args::Cli::parse();
    let paths = commands::Paths::resolve(cli.data_dir);

    match cli.cmd {
        args::Command::Add {
            name,
            wifi,
            time,
            image,
        } => commands::add(&paths, name, wifi, time, &image),
        args::Command::List => commands::list(&paths),
        args::Command::Move { from, to } => commands::move_rule(&paths, from, to),
        args::Command::Remove { position } => commands::remove(&paths, position),
        args::Command::SetDefault { image } => commands::set_default(&paths, &image),
        args::Command::Status => commands::status(),
    }
}
