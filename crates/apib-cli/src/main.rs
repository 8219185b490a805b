use std::process;

fn main() {
    match apib_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("apib error: {err:#}");
            process::exit(1);
        }
    }
}
