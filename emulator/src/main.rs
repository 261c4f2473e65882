mod command;
mod session;
mod sim;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::Session;

fn main() -> io::Result<()> {
    let seed = parse_seed().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: event-emulator [--seed <n>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(seed);
    let mut line = String::new();

    writeln!(
        writer,
        "Event emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed) {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_seed() -> Result<Option<u64>, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(None);
    };

    let value = if let Some(value) = arg.strip_prefix("--seed=") {
        value.to_owned()
    } else if arg == "--seed" {
        args.next()
            .ok_or_else(|| "Expected value after --seed".to_string())?
    } else {
        return Err(format!("Unknown argument `{arg}`"));
    };

    value
        .parse()
        .map(Some)
        .map_err(|_| format!("Invalid seed `{value}`"))
}
