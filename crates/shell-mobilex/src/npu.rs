//! Neural-mix step.
//!
//! An 8-bit quantized depthwise-separable convolution over a 32×32×3
//! tensor derived from the working digest. The step binds a bounded amount
//! of neural-inference-shaped work (the layer every mobile NPU accelerates)
//! into the hash without breaking determinism: all arithmetic is integer,
//! all weights are protocol constants, and the tensor is expanded from the
//! digest with SHAKE-256.

use sha2::{Digest, Sha256};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

const WIDTH: usize = 32;
const HEIGHT: usize = 32;
const CHANNELS: usize = 3;

/// Fixed 3×3 depthwise kernels, one per channel. Integer weights chosen
/// small so accumulators stay well inside i32.
const DEPTHWISE_KERNELS: [[i32; 9]; CHANNELS] = [
    [1, -2, 1, 2, 4, -2, 1, 2, -1],
    [-1, 3, -1, 1, -5, 1, 2, 1, -2],
    [2, 1, -3, -1, 2, 1, 3, -1, 1],
];

/// Fixed 1×1 pointwise kernel combining the three depthwise outputs.
const POINTWISE_KERNEL: [[i32; CHANNELS]; CHANNELS] = [
    [3, -1, 2],
    [-2, 4, 1],
    [1, 2, -3],
];

/// Right-shift used to requantize accumulators back to 8 bits.
const REQUANT_SHIFT: u32 = 4;

/// Compute the 32-byte neural-mix digest for a working state.
///
/// Pipeline: SHAKE-expand the state into the input tensor, run the
/// depthwise 3×3 pass (same-padding), the pointwise 1×1 pass, requantize
/// to i8 at each stage, then SHA-256 the output tensor.
pub fn neural_mix(state: &[u8; 32]) -> [u8; 32] {
    let tensor = expand_tensor(state);
    let depthwise = depthwise_pass(&tensor);
    let pointwise = pointwise_pass(&depthwise);

    let mut hasher = Sha256::new();
    for channel in &pointwise {
        for row in channel {
            let bytes: Vec<u8> = row.iter().map(|v| *v as u8).collect();
            sha2::Digest::update(&mut hasher, &bytes);
        }
    }
    hasher.finalize().into()
}

/// XOR the neural-mix digest into the working state.
pub fn apply_neural_mix(state: &mut [u8; 32]) {
    let mix = neural_mix(state);
    for (s, m) in state.iter_mut().zip(mix.iter()) {
        *s ^= m;
    }
}

type Tensor = [[[i8; WIDTH]; HEIGHT]; CHANNELS];

fn expand_tensor(state: &[u8; 32]) -> Tensor {
    let mut hasher = Shake256::default();
    hasher.update(b"shell.mobilex.npu.v1");
    hasher.update(state);
    let mut reader = hasher.finalize_xof();

    let mut tensor = [[[0i8; WIDTH]; HEIGHT]; CHANNELS];
    let mut row_bytes = [0u8; WIDTH];
    for channel in tensor.iter_mut() {
        for row in channel.iter_mut() {
            reader.read(&mut row_bytes);
            for (cell, byte) in row.iter_mut().zip(row_bytes.iter()) {
                *cell = *byte as i8;
            }
        }
    }
    tensor
}

fn depthwise_pass(input: &Tensor) -> Tensor {
    let mut out = [[[0i8; WIDTH]; HEIGHT]; CHANNELS];
    for (c, kernel) in DEPTHWISE_KERNELS.iter().enumerate() {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let mut acc = 0i32;
                for ky in 0..3usize {
                    for kx in 0..3usize {
                        // Same-padding: out-of-range taps contribute zero.
                        let sy = y as isize + ky as isize - 1;
                        let sx = x as isize + kx as isize - 1;
                        if (0..HEIGHT as isize).contains(&sy) && (0..WIDTH as isize).contains(&sx)
                        {
                            acc += kernel[ky * 3 + kx]
                                * input[c][sy as usize][sx as usize] as i32;
                        }
                    }
                }
                out[c][y][x] = requantize(acc);
            }
        }
    }
    out
}

fn pointwise_pass(input: &Tensor) -> Tensor {
    let mut out = [[[0i8; WIDTH]; HEIGHT]; CHANNELS];
    for (c_out, weights) in POINTWISE_KERNEL.iter().enumerate() {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let acc: i32 = (0..CHANNELS)
                    .map(|c_in| weights[c_in] * input[c_in][y][x] as i32)
                    .sum();
                out[c_out][y][x] = requantize(acc);
            }
        }
    }
    out
}

#[inline]
fn requantize(acc: i32) -> i8 {
    (acc >> REQUANT_SHIFT).clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_deterministic() {
        let state = [0x5Au8; 32];
        assert_eq!(neural_mix(&state), neural_mix(&state));
    }

    #[test]
    fn mix_depends_on_state() {
        assert_ne!(neural_mix(&[0u8; 32]), neural_mix(&[1u8; 32]));
    }

    #[test]
    fn apply_is_an_xor_of_the_mix() {
        let original = [0x77u8; 32];
        let mix = neural_mix(&original);
        let mut state = original;
        apply_neural_mix(&mut state);
        for i in 0..32 {
            assert_eq!(state[i], original[i] ^ mix[i]);
        }
    }

    #[test]
    fn requantize_saturates() {
        assert_eq!(requantize(i32::MAX), i8::MAX);
        assert_eq!(requantize(i32::MIN), i8::MIN);
        assert_eq!(requantize(16), 1);
        assert_eq!(requantize(-16), -1);
    }
}
