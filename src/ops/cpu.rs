//! Parallel CPU padding kernels.
//!
//! # CPU Backend
//!
//! The two raw kernels behind `DispatchKey::Cpu`. They know nothing about
//! autograd: tensors in, tensors out.
//!
//! ## Geometry
//!
//! The trailing two axes of the input are read as an equirectangular grid
//! (`H` latitude rows by `W` longitude columns); every leading axis indexes an
//! independent plane.
//!
//! - Left/right padding wraps around longitude.
//! - Top/bottom padding crosses a pole: rows are mirrored and longitude turns by
//!   half a revolution (`W / 2` columns).
//! - For odd `W` the half turn lands between two columns; `nearest` takes the left
//!   one and `bilinear` averages both.
//!
//! Each output cell reads one or two input cells, so the gradient kernel is the
//! exact adjoint: a scatter-add of every output gradient onto the cells it read.
//!
//! ## Parallelism
//!
//! Planes are processed in parallel with [`rayon`]; the tap table is built once
//! per call and shared by all planes.

use rayon::prelude::*;

use crate::error::KernelError;
use crate::ops::args::{Interpolation, PadArgs};
use crate::tensors::{Ten64, Tensor};

/// Validated padding geometry for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    h: usize,
    w: usize,
    pad_l: usize,
    pad_r: usize,
    pad_u: usize,
    pad_d: usize,
    mode: Interpolation,
}

impl Geometry {
    fn resolve(shape: &[usize], args: &PadArgs) -> Result<Self, KernelError> {
        let rank = shape.len();
        if rank < 2 {
            return Err(KernelError::RankTooSmall(rank));
        }
        let h = shape[rank - 2];
        let w = shape[rank - 1];

        let pad_l = non_negative("pad_l", args.pad_l)?;
        let pad_r = non_negative("pad_r", args.pad_r)?;
        let pad_u = non_negative("pad_u", args.pad_u)?;
        let pad_d = non_negative("pad_d", args.pad_d)?;
        let mode = args.interpolation.parse::<Interpolation>()?;

        for (name, pad, size) in [
            ("pad_l", pad_l, w),
            ("pad_r", pad_r, w),
            ("pad_u", pad_u, h),
            ("pad_d", pad_d, h),
        ] {
            if pad > size {
                return Err(KernelError::ShapeTooSmall { name, pad, size });
            }
        }

        Ok(Self {
            h,
            w,
            pad_l,
            pad_r,
            pad_u,
            pad_d,
            mode,
        })
    }

    fn out_h(&self) -> usize {
        self.h + self.pad_u + self.pad_d
    }

    fn out_w(&self) -> usize {
        self.w + self.pad_l + self.pad_r
    }

    fn out_shape(&self, shape: &[usize]) -> Vec<usize> {
        let mut out = shape.to_vec();
        let rank = out.len();
        out[rank - 2] = self.out_h();
        out[rank - 1] = self.out_w();
        out
    }

    /// One tap per output cell, indices relative to the input plane.
    fn taps(&self) -> Vec<Tap> {
        let (h, w) = (self.h as isize, self.w);
        let mut taps = Vec::with_capacity(self.out_h() * self.out_w());

        for i in 0..self.out_h() {
            let r = i as isize - self.pad_u as isize;
            let (row, over_pole) = if r < 0 {
                ((-r - 1) as usize, true)
            } else if r >= h {
                ((2 * h - 1 - r) as usize, true)
            } else {
                (r as usize, false)
            };
            let base = row * w;

            for j in 0..self.out_w() {
                let col = (j as isize - self.pad_l as isize).rem_euclid(w as isize) as usize;
                if !over_pole {
                    taps.push(Tap::One(base + col));
                    continue;
                }

                let left = (col + w / 2) % w;
                if w % 2 == 0 || self.mode == Interpolation::Nearest {
                    taps.push(Tap::One(base + left));
                } else {
                    taps.push(Tap::Half(base + left, base + (left + 1) % w));
                }
            }
        }

        taps
    }
}

/// Input cells read by one output cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tap {
    One(usize),
    Half(usize, usize),
}

fn non_negative(name: &'static str, value: i64) -> Result<usize, KernelError> {
    usize::try_from(value).map_err(|_| KernelError::NegativePad { name, value })
}

/// Pads the trailing two axes of `input` spherically.
///
/// # Returns
/// A tensor of shape `[..., H + pad_u + pad_d, W + pad_l + pad_r]`.
///
/// # Errors
/// Any [`KernelError`]: negative pads, unknown mode, rank below 2, padding larger
/// than the axis it is applied to, or a malformed buffer.
///
/// # Example
/// ```rust
/// use sphere_pad::ops::{args::PadArgs, cpu};
/// use sphere_pad::tensor;
///
/// let x = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// let out = cpu::spherical_pad2d(&x, &PadArgs::new(1, 1, 0, 0, "nearest")).unwrap();
/// assert_eq!(out.data(), &[2.0, 1.0, 2.0, 1.0, 4.0, 3.0, 4.0, 3.0]);
/// ```
pub fn spherical_pad2d(input: &Ten64, args: &PadArgs) -> Result<Ten64, KernelError> {
    input.check()?;
    let geo = Geometry::resolve(input.shape(), args)?;
    let out_shape = geo.out_shape(input.shape());
    log::trace!("spherical_pad2d kernel: {:?} -> {:?} ({})", input.shape(), out_shape, geo.mode);

    let plane_in = geo.h * geo.w;
    let plane_out = geo.out_h() * geo.out_w();
    if plane_in == 0 || plane_out == 0 {
        return Ok(Tensor::zeros(out_shape));
    }
    let planes = input.numel() / plane_in;
    let taps = geo.taps();

    let mut out = vec![0.0f64; planes * plane_out];
    out.par_chunks_mut(plane_out)
        .zip(input.data().par_chunks(plane_in))
        .for_each(|(dst, src)| {
            for (y, tap) in dst.iter_mut().zip(&taps) {
                *y = match *tap {
                    Tap::One(a) => src[a],
                    Tap::Half(a, b) => 0.5 * src[a] + 0.5 * src[b],
                };
            }
        });

    Ok(Tensor::new(out_shape, out))
}

/// Gradient of [`spherical_pad2d`] with respect to its input.
///
/// `grad_output` must be shaped like the padded output of `input`; the result is
/// shaped like `input`. Only the shape of `input` is read.
///
/// # Errors
/// The same validation as the forward kernel, plus
/// [`KernelError::ShapeMismatch`] when `grad_output` is not the padded shape.
pub fn spherical_pad2d_backward(
    grad_output: &Ten64,
    input: &Ten64,
    args: &PadArgs,
) -> Result<Ten64, KernelError> {
    input.check()?;
    grad_output.check()?;
    let geo = Geometry::resolve(input.shape(), args)?;
    let expected = geo.out_shape(input.shape());
    if grad_output.shape() != expected.as_slice() {
        return Err(KernelError::ShapeMismatch {
            expected,
            actual: grad_output.shape().to_vec(),
        });
    }
    log::trace!("spherical_pad2d_backward kernel: {:?} -> {:?}", grad_output.shape(), input.shape());

    let plane_in = geo.h * geo.w;
    let plane_out = geo.out_h() * geo.out_w();
    if plane_in == 0 || plane_out == 0 {
        return Ok(Tensor::zeros(input.shape().to_vec()));
    }
    let taps = geo.taps();

    let mut grad = vec![0.0f64; input.numel()];
    grad.par_chunks_mut(plane_in)
        .zip(grad_output.data().par_chunks(plane_out))
        .for_each(|(dst, src)| {
            for (&g, tap) in src.iter().zip(&taps) {
                match *tap {
                    Tap::One(a) => dst[a] += g,
                    Tap::Half(a, b) => {
                        dst[a] += 0.5 * g;
                        dst[b] += 0.5 * g;
                    }
                }
            }
        });

    Ok(Tensor::new(input.shape().to_vec(), grad))
}
