// pulp-fibers demo firmware for ESP32-C3 boards
//
// Boot sequence: logger -> hal -> heap -> LED -> start loops -> main loop
// Three loops share the CPU: LED blink, heartbeat log, and main itself.
// Every wait goes through YieldingDelay, which hands the CPU to the next
// fiber instead of spinning.
//
// Build: cargo build --release --features esp32c3 --target riscv32imc-unknown-none-elf

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Level, Output, OutputConfig};
use log::{error, info};

use pulp_fibers::{YieldingDelay, current_fiber, fiber_count, for_each_fiber, start_loop};

extern crate alloc;

esp_bootloader_esp_idf::esp_app_desc!();

const HEAP_SIZE: usize = 64 * 1024;

const BLINK_STACK: usize = 2048;
const HEARTBEAT_STACK: usize = 4096;

const BLINK_MS: u32 = 250;
const HEARTBEAT_MS: u32 = 1000;
const MAIN_REPORT_MS: u32 = 5000;

static LED: Mutex<RefCell<Option<Output<'static>>>> = Mutex::new(RefCell::new(None));

static BLINKS: AtomicU32 = AtomicU32::new(0);

fn blink_loop() {
    critical_section::with(|cs| {
        if let Some(led) = LED.borrow_ref_mut(cs).as_mut() {
            led.toggle();
        }
    });
    BLINKS.fetch_add(1, Ordering::Relaxed);
    YieldingDelay::new(Delay::new()).delay_ms(BLINK_MS);
}

fn heartbeat_loop() {
    info!(
        "{}: {} blinks so far",
        current_fiber(),
        BLINKS.load(Ordering::Relaxed)
    );
    YieldingDelay::new(Delay::new()).delay_ms(HEARTBEAT_MS);
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    info!("booting...");

    let led = Output::new(peripherals.GPIO8, Level::High, OutputConfig::default());
    critical_section::with(|cs| {
        LED.borrow_ref_mut(cs).replace(led);
    });
    info!("led initialized.");

    // each call runs the new loop once before returning here
    if let Err(e) = start_loop(blink_loop, BLINK_STACK) {
        error!("blink loop: {}", e);
    }
    if let Err(e) = start_loop(heartbeat_loop, HEARTBEAT_STACK) {
        error!("heartbeat loop: {}", e);
    }
    info!("{} fibers running.", fiber_count());

    let mut delay = YieldingDelay::new(Delay::new());
    loop {
        for_each_fiber(|fiber| {
            info!(
                "  {} stack={} resume={:#x}",
                fiber.id, fiber.stack_size, fiber.resume_address
            );
        });
        let stats = esp_alloc::HEAP.stats();
        info!("heap used {} / {}", stats.current_usage, HEAP_SIZE);
        delay.delay_ms(MAIN_REPORT_MS);
    }
}
