use scol_cli::args::run;

fn main() {
    if let Err(err) = run() {
        let _ = scol_cli::utils::sh_err(&format!("{err:?}"));
        std::process::exit(1);
    }
}
