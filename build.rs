use rand_chacha::{
    ChaCha20Rng,
    rand_core::{RngCore, SeedableRng},
};
use std::{
    env,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Seed of the `Seeded` gear preset when `GEAR_SEED` is unset or not a `u64`.
const DEFAULT_GEAR_SEED: u64 = 14387234659234864480;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GEAR_SEED");

    let seed = env::var("GEAR_SEED")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_GEAR_SEED);

    if seed != DEFAULT_GEAR_SEED {
        println!("cargo:warning=seeded gear table generated from GEAR_SEED={seed}");
    }

    let out_dir = env::var("OUT_DIR").unwrap();
    write_gear_table(&Path::new(&out_dir).join("gear_table.rs"), seed);
}

// --- Seeded Gear Table ---

fn write_gear_table(dest_path: &Path, seed: u64) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let rows: Vec<String> = (0..256 / 4)
        .map(|_| {
            let row: Vec<String> = (0..4).map(|_| format!("{:#018x}", rng.next_u64())).collect();
            format!("    {},", row.join(", "))
        })
        .collect();

    let mut out = BufWriter::new(File::create(dest_path).unwrap());

    writeln!(out, "/// Seed [`SEEDED_GEAR`] was drawn from.").unwrap();
    writeln!(out, "pub const SEEDED_GEAR_SEED: u64 = {seed};").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "/// Gear table drawn from a ChaCha20 stream seeded with `{seed}`.").unwrap();
    writeln!(out, "///").unwrap();
    writeln!(out, "/// Set `GEAR_SEED` at build time to draw a different table.").unwrap();
    writeln!(out, "#[rustfmt::skip]").unwrap();
    writeln!(out, "pub static SEEDED_GEAR: [u64; 256] = [").unwrap();
    writeln!(out, "{}", rows.join("\n")).unwrap();
    writeln!(out, "];").unwrap();
}
