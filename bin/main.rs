use automata_lib::gpu::{GpuAutomata, GpuContext};
use automata_lib::mesh::VERTICES_PER_FACE;
use automata_lib::*;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::u32::UVec3;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Runs a 3D cellular automaton and reports what each generation looks like.
#[derive(Parser)]
#[command(name = "automata")]
struct Args {
    #[arg(long, default_value_t = 64)]
    width: u32,
    #[arg(long, default_value_t = 64)]
    height: u32,
    #[arg(long, default_value_t = 64)]
    depth: u32,
    /// Rule string, `B <counts> / S <counts> [/ <states>]`.
    #[arg(long, default_value = "B 4,5,10,14,21,25 / S 6,8,12,13,18,25 / 6")]
    rule: String,
    /// Number of generations to run.
    #[arg(long, default_value_t = 100)]
    generations: u64,
    /// Seeded cells come alive with probability 1 / one-in.
    #[arg(long, default_value_t = 2)]
    one_in: u32,
    /// Edge of the centered seeding cube.
    #[arg(long, default_value_t = 6)]
    seed_width: u32,
    #[arg(long)]
    rng_seed: Option<u64>,
    /// Minimum time between generations, in milliseconds.
    #[arg(long, default_value_t = 50)]
    delay_ms: u64,
    /// Step and mesh on the GPU instead of the host.
    #[arg(long)]
    gpu: bool,
}

impl Args {
    fn dim(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    fn rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn palette_for(rule: &str) -> Result<Palette, Error> {
    let rule = RuleSpec::parse(rule)?;
    Ok(Palette::gradient(rule.state_count(), 0x7e00ff, 0x00bcff))
}

/// Calls `generation` once per due frame until `count` generations have run.
fn paced<F>(count: u64, delay: Duration, mut generation: F) -> Result<(), Error>
where
    F: FnMut() -> Result<(), Error>,
{
    let mut timer = FrameTimer::new(delay);
    let mut last_draw = Instant::now();
    let mut done = 0;
    while done < count {
        let now = Instant::now();
        if timer.tick(now - last_draw) {
            generation()?;
            done += 1;
        } else {
            thread::sleep(MIN_FRAME_DELAY);
        }
        last_draw = now;
    }
    Ok(())
}

fn run_host(args: &Args) -> Result<(), Error> {
    let mut simulation = Simulation::new(args.dim(), &args.rule, palette_for(&args.rule)?)?;
    simulation.seed(&Seed::random_cube(args.one_in, args.seed_width), &mut args.rng());

    paced(args.generations, Duration::from_millis(args.delay_ms), || {
        simulation.step();
        let faces = simulation.remesh().emitted_count();
        let census = simulation.census();
        info!(
            "generation {}: {} alive, {} refractory, {} faces",
            simulation.generation(),
            census.alive,
            census.refractory,
            faces
        );
        Ok(())
    })
}

fn run_gpu(args: &Args) -> Result<(), Error> {
    let context = pollster::block_on(GpuContext::new())?;
    let (device, queue) = (&context.device, &context.queue);

    let mut automata = GpuAutomata::new(args.dim(), &args.rule, &palette_for(&args.rule)?, device)?;
    automata.seed(&Seed::random_cube(args.one_in, args.seed_width), &mut args.rng());
    automata.push(queue);

    paced(args.generations, Duration::from_millis(args.delay_ms), || {
        automata.step(device, queue);
        automata.remesh(device, queue);
        let census = census(pollster::block_on(automata.pull(device, queue))?);
        info!(
            "generation {}: {} alive, {} refractory",
            automata.generation(),
            census.alive,
            census.refractory
        );
        Ok(())
    })?;

    let vertices = pollster::block_on(automata.read_mesh(device, queue))?;
    let faces = vertices
        .chunks(VERTICES_PER_FACE)
        .filter(|slot| !slot[0].is_absent())
        .count();
    info!("final mesh has {} faces", faces);
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();
    if args.gpu {
        run_gpu(&args)
    } else {
        run_host(&args)
    }
}
