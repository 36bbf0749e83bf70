// Console chat front-end
//
//   cargo run --example chat -- --transport shm --channel demo --peer A
//   cargo run --example chat -- --transport shm --channel demo --peer B
//   cargo run --example chat -- --mode server --port 54000
//   cargo run --example chat -- --mode client --host 127.0.0.1 --port 54000
//
// Type a line and press Enter to send it. Ctrl+C quits.
use duochat::{ChatConfig, ChatEvent};
use std::env;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1).as_deref() {
        Some("--config") => match env::args().nth(2) {
            Some(path) => ChatConfig::load(path)?,
            None => return Err("--config needs a path".into()),
        },
        _ => ChatConfig::from_args(env::args().skip(1)),
    };
    println!("Starting {:?} chat: {:?}", config.transport, config);

    let handle = Arc::new(duochat::start(config)?);

    let keep_alive = Arc::new(AtomicBool::new(true));
    let keep_alive_for_handler = Arc::clone(&keep_alive);

    // Handle Ctrl+C to clean up
    ctrlc::set_handler(move || {
        keep_alive_for_handler.store(false, Ordering::SeqCst);
    })?;

    // stdin blocks, so it gets its own thread; the main loop owns shutdown
    let input_handle = Arc::clone(&handle);
    let input_alive = Arc::clone(&keep_alive);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Err(e) = duochat::send(&input_handle, line.trim_end()) {
                eprintln!("Send failed: {}", e);
            }
        }
        input_alive.store(false, Ordering::SeqCst);
    });

    while keep_alive.load(Ordering::SeqCst) {
        match handle.events().recv_timeout(Duration::from_millis(100)) {
            Ok(ChatEvent::StatusChanged(state)) => println!("--- Status: {} ---", state),
            Ok(event) => println!("{}", event),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    duochat::stop(&handle);
    for event in handle.events().try_iter() {
        println!("{}", event);
    }
    println!("Bye.");
    Ok(())
}
