//! Writes a small archive laid out like the real Stanford Dogs download, so
//! the pipeline can run offline:
//!
//! ```sh
//! cargo run --bin generate_sample -- --output dados/stanford-dogs-dataset.zip
//! busca-doggo get-dataset --from-archive dados/stanford-dogs-dataset.zip
//! ```

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageFormat, Rgb, RgbImage};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const BREEDS: [(&str, &str); 5] = [
    ("n02085620", "Chihuahua"),
    ("n02088364", "beagle"),
    ("n02090379", "Lakeland-terrier"),
    ("n02096294", "Australian_terrier"),
    ("n02110958", "pug"),
];

#[derive(Parser)]
#[command(name = "generate_sample", about = "Write a synthetic dog breed archive")]
struct Args {
    /// Archive to write
    #[arg(long, default_value = "stanford-dogs-dataset.zip")]
    output: PathBuf,

    /// Images per breed
    #[arg(long, default_value_t = 8)]
    per_breed: usize,

    /// Image side length in pixels
    #[arg(long, default_value_t = 32)]
    size: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_u8(&mut self) -> u8 {
        (self.next_u64() >> 56) as u8
    }
}

/// A noisy image tinted with a per-breed base colour.
fn synth_jpeg(size: u32, base: [u8; 3], rng: &mut SimpleRng) -> Result<Vec<u8>> {
    let img = RgbImage::from_fn(size, size, |_, _| {
        let noise = rng.next_u8() / 4;
        Rgb([
            base[0].saturating_add(noise),
            base[1].saturating_add(noise),
            base[2].saturating_add(noise),
        ])
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Jpeg)
        .context("encoding JPEG")?;
    Ok(bytes.into_inner())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (id, breed) in BREEDS {
        let folder = format!("{id}-{breed}");
        let base = [rng.next_u8(), rng.next_u8(), rng.next_u8()];

        for n in 0..args.per_breed {
            let stem = format!("{id}_{}", 1000 + n * 37);

            zip.start_file(format!("images/Images/{folder}/{stem}.jpg"), options)?;
            zip.write_all(&synth_jpeg(args.size, base, &mut rng)?)?;

            zip.start_file(format!("annotations/Annotation/{folder}/{stem}"), options)?;
            write!(
                zip,
                "<annotation><filename>{stem}</filename>\
                 <object><name>{breed}</name></object></annotation>"
            )?;
        }
    }
    zip.finish()?;

    println!(
        "Wrote {} breeds x {} images to {}",
        BREEDS.len(),
        args.per_breed,
        args.output.display()
    );
    Ok(())
}
