/// Preview: interactive shell for playing through a narrative package.
///
/// Usage: preview --package <path> [--seed <n>] [--responsibility <n>]
///
/// Commands:
///   enter <id>         : enter a dialogue, choice or event
///   next               : advance the current dialogue
///   choose <n>         : select option n of the current choice
///   set <key> <value>  : set a state variable
///   state              : print state variables
///   ids                : list every node id
///   lint               : run validation
///   save <file>        : write position and state to a file
///   load <file>        : restore position and state from a file
///   help               : list commands
///   quit               : exit

use narrative_graph::core::markup;
use narrative_graph::core::session::{NarrativeSession, SessionSnapshot, Step};
use narrative_graph::core::store::NarrativeStore;
use narrative_graph::schema::dialogue::is_terminal;
use narrative_graph::schema::state::{StateAccess, Value, VariableStore};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut package_path = None;
    let mut seed: u64 = 42;
    let mut responsibility: i64 = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--package" if i + 1 < args.len() => {
                i += 1;
                package_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--responsibility" if i + 1 < args.len() => {
                i += 1;
                responsibility = args[i].parse().unwrap_or(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(package_path) = package_path else {
        eprintln!("Missing --package");
        print_usage();
        std::process::exit(1);
    };

    let builder = NarrativeStore::builder().strict(false);
    let builder = if Path::new(&package_path).is_dir() {
        builder.package_dir(&package_path)
    } else {
        builder.package_file(&package_path)
    };
    let store = match builder.build() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("ERROR: Failed to load package: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded {} nodes", store.len());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let state = VariableStore::new().with_responsibility(responsibility);
    let mut session = NarrativeSession::new(&store, state).seed(seed);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "enter" => {
                if parts.len() < 2 {
                    println!("Usage: enter <id>");
                    continue;
                }
                match session.enter(parts[1]) {
                    Ok(step) => print_step(&step),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "next" | "n" => match session.advance() {
                Ok(step) => print_step(&step),
                Err(e) => println!("ERROR: {}", e),
            },
            "choose" | "c" => {
                let Some(index) = parts.get(1).and_then(|p| p.parse::<usize>().ok()) else {
                    println!("Usage: choose <n>");
                    continue;
                };
                match session.choose(index) {
                    Ok(outcome) => {
                        let tag = outcome.classification.as_str();
                        println!(
                            "  -> {} [{}]",
                            outcome.next,
                            if tag.is_empty() { "neutral" } else { tag }
                        );
                        if let Some(skip) = outcome.tutorial_skip {
                            println!("  (tutorial skips to step {})", skip);
                        }
                        if !is_terminal(&outcome.next) {
                            println!("  Use 'enter {}' to continue.", outcome.next);
                        }
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "set" => {
                if parts.len() < 3 {
                    println!("Usage: set <key> <value>");
                    continue;
                }
                let value = parse_value(&parts[2..].join(" "));
                println!("{} = {}", parts[1], value);
                session.state_mut().set_variable(parts[1], value);
            }
            "state" => {
                if session.state().is_empty() {
                    println!("  (no variables)");
                }
                for (key, value) in session.state().sorted() {
                    println!("  {} = {}", key, value);
                }
            }
            "ids" => {
                for (id, kind) in store.ids() {
                    println!("  {:<10} {}", kind.to_string(), id);
                }
            }
            "lint" => {
                let issues = store.validate();
                if issues.is_empty() {
                    println!("All checks passed!");
                }
                for issue in issues {
                    println!("  {:?}: {}", issue.severity(), issue);
                }
            }
            "save" => {
                if parts.len() < 2 {
                    println!("Usage: save <file>");
                    continue;
                }
                let save = (session.snapshot(), session.state().clone());
                match ron::to_string(&save) {
                    Ok(text) => match std::fs::write(parts[1], text) {
                        Ok(()) => println!("Saved to {}", parts[1]),
                        Err(e) => println!("ERROR: {}", e),
                    },
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "load" => {
                if parts.len() < 2 {
                    println!("Usage: load <file>");
                    continue;
                }
                let loaded = std::fs::read_to_string(parts[1])
                    .map_err(|e| e.to_string())
                    .and_then(|text| {
                        ron::from_str::<(SessionSnapshot, VariableStore)>(&text)
                            .map_err(|e| e.to_string())
                    });
                match loaded {
                    Ok((snapshot, state)) => {
                        *session.state_mut() = state;
                        match session.restore(&snapshot) {
                            Ok(Some(step)) => print_step(&step),
                            Ok(None) => println!("Restored (idle)."),
                            Err(e) => println!("ERROR: {}", e),
                        }
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            _ => {
                println!("Unknown command: '{}'. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn print_step(step: &Step<'_>) {
    match step {
        Step::Line { line, index, dialogue } => {
            println!("\n[{} #{}] {}: {}", dialogue, index, line.speaker, markup::format(&line.text));
            let cues: Vec<String> = [
                (!line.effect.is_empty()).then(|| format!("effect={}", line.effect)),
                line.image.as_ref().map(|s| format!("image={}", s)),
                line.sound.as_ref().map(|s| format!("sound={}", s)),
                line.cutscene.as_ref().map(|s| format!("cutscene={}", s)),
            ]
            .into_iter()
            .flatten()
            .collect();
            if !cues.is_empty() {
                println!("  ({})", cues.join(", "));
            }
        }
        Step::Choice { choice, options } => {
            println!("\n[{}]", choice.id);
            if options.is_empty() {
                println!("  (no options open at this responsibility)");
            }
            for option in options {
                println!("  {}) {}", option.index, markup::format(&option.line.text));
            }
        }
        Step::Event { event, report } => {
            if report.fired {
                println!("\n[{}] fired, applied effects {:?}", event, report.applied);
            } else {
                println!("\n[{}] conditions not met", event);
            }
        }
        Step::Completed => println!("\n(dialogue complete)"),
        Step::Transition(target) => {
            println!("\n(dialogue continues at '{}'; use 'enter {}')", target, target)
        }
    }
}

fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn print_usage() {
    println!("Usage: preview --package <path> [--seed <n>] [--responsibility <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  enter <id>         : enter a dialogue, choice or event");
    println!("  next               : advance the current dialogue");
    println!("  choose <n>         : select option n of the current choice");
    println!("  set <key> <value>  : set a state variable");
    println!("  state              : print state variables");
    println!("  ids                : list every node id");
    println!("  lint               : run validation");
    println!("  save <file>        : write position and state to a file");
    println!("  load <file>        : restore position and state from a file");
    println!("  help               : show this help");
    println!("  quit               : exit");
}
