use std::time::Duration;

use deckinput::backends::virtual_input::{Command, VirtualSampler};
use deckinput::wire::{WallClock, WireEvent};
use deckinput::{init_logging, ChannelPublisher, DeckConfig, InputEngine, PollLoop, Shutdown};

fn main() {
    init_logging(Some("info"));

    let config = DeckConfig::default();
    let sampler = VirtualSampler::new();
    let lines = sampler.handle();
    let engine = InputEngine::bring_up(&config, sampler).expect("virtual lines always claim");

    let shutdown = Shutdown::new();
    let (publisher, rx) = ChannelPublisher::bounded(256);
    let poll = PollLoop::new(engine, publisher, config.poll_interval(), shutdown.clone());
    let worker = std::thread::spawn(move || poll.run());

    let clock = WallClock::now();
    let script = [
        "e1+", "e1+", "e1+", "e1-", "green", "green", "e1p", "e2-", "key", "key",
    ];
    for line in script {
        let command: Command = line.parse().expect("script commands parse");
        lines
            .apply(&config, &command)
            .expect("script targets configured inputs");
        // Longer than the button window, so every step is accepted.
        std::thread::sleep(Duration::from_millis(250));

        for event in rx.try_iter() {
            if let Ok(wire) = WireEvent::from_change(&event, &clock).encode_line() {
                print!("{line:>6} -> {wire}");
            }
        }
    }

    shutdown.trigger();
    let stats = worker.join().expect("poll thread");
    println!("{} tick(s), {} event(s)", stats.ticks, stats.events);
}
