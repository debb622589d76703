//! Random sources for the categorical draw.

/// Uniform `[0, 1)` floats for weighted selection.
///
/// The pipeline owns one of these; tests pass a [`SeededRng`] for
/// reproducible draws.
pub trait RandomSource {
    fn next_f32(&mut self) -> f32;
}

/// Deterministic RNG for reproducible sampling.
///
/// xorshift64 over a splitmix64-scrambled seed. Raw small seeds would leave
/// the high bits zero for the first few steps, and `next_f32` reads the high
/// bits.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        let state = splitmix64(seed);
        // xorshift never leaves the zero state
        Self {
            state: if state == 0 { 1 } else { state },
        }
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl RandomSource for SeededRng {
    fn next_f32(&mut self) -> f32 {
        // xorshift64
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 40) as f32 / (1u64 << 24) as f32
    }
}

impl RandomSource for rand::rngs::StdRng {
    fn next_f32(&mut self) -> f32 {
        rand::Rng::gen::<f32>(self)
    }
}
