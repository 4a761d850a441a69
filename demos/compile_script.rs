//! Example: Compile, plan and serialize an MSL script.
//!
//! This example demonstrates how to:
//! - Compile a script mixing MSL and legacy syntax
//! - Plan trapezoidal profiles with configured defaults
//! - Inspect the JSON payloads the bridge would send
//!
//! Run with: `cargo run --example compile_script [path/to/script.msl]`

use palletizer_motion::{
    bridge::CommandSerializer,
    config::parse_config,
    error::Result,
    queue::{CommandQueue, Priority},
    script::render,
    Compiler, Planner,
};

const SAMPLE_SCRIPT: &str = r#"
// Pick a box from the conveyor and place it on layer one
FUNC(PICK){
    Z(0);
    G(1, d200);
    Z(800);
}

FUNC(PLACE){
    Z(150);
    G(0, d200);
    Z(800);
}

HOME
SPEED(1200)
LOOP(3){
    DETECT(box);
    CALL(PICK);
    GROUPSYNC(X(2400), Y(600), T(90));
    CALL(PLACE);
    GROUP(X(0), Y(0), T(0));
}

# legacy form still works
SYNC
X100
Y40
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== MSL Compile Example ===\n");

    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).unwrap_or_else(|e| {
            eprintln!("could not read {}: {}", path, e);
            std::process::exit(1);
        }),
        None => SAMPLE_SCRIPT.to_string(),
    };

    let config = parse_config(
        r#"
[planner]
default_speed = 1000.0
default_accel = 500.0
"#,
    )?;

    let compiler = Compiler::with_options(config.compiler);
    let script = match compiler.compile(&source) {
        Ok(script) => script,
        Err(errors) => {
            eprintln!("{} error(s):", errors.len());
            for error in errors.iter() {
                eprintln!("  {} ({})", error, error.kind);
            }
            std::process::exit(1);
        }
    };

    println!("Functions:");
    for function in script.functions.iter() {
        println!(
            "  {} (line {}): {} commands",
            function.name,
            function.defined_at(),
            function.commands.len()
        );
    }

    Planner::validate(&script.commands)?;
    let planned = Planner::new(config.planner).plan(&script.commands);
    println!("\nExpanded to {} commands, {} after planning\n", script.commands.len(), planned.len());
    println!("Rendered:\n{}", render(&planned));

    let mut queue = CommandQueue::new(config.queue);
    queue.enqueue(planned, Priority::Normal);
    let serializer = CommandSerializer::new(&config.bridge);

    let mut total_ms = 0;
    println!("Wire payloads:");
    while let Some(item) = queue.dequeue() {
        let payload = serializer.serialize(item)?;
        total_ms += payload.duration.unwrap_or(0);
        println!("  {:<28} timeout {:>6} ms", payload.serial_cmd, payload.timeout);
        queue.mark_current_complete();
    }

    println!("\nPlanned run time: {:.1} s", total_ms as f64 / 1000.0);
    Ok(())
}
