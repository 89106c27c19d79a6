use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// A dense complex-valued 3D grid stored row-major (`z` fastest).
///
/// Element `(x, y, z)` lives at `z + nz * (y + ny * x)`, matching the layout
/// produced by [`super::spatial_grid::map_to_spatial_grid`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid3 {
    dims: [usize; 3],
    data: Vec<Complex<f64>>,
}

impl Grid3 {
    pub fn zeros(dims: [usize; 3]) -> Self {
        Self {
            dims,
            data: vec![Complex::new(0.0, 0.0); dims[0] * dims[1] * dims[2]],
        }
    }

    /// Wraps real values laid out as `z + nz * (y + ny * x)`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` does not equal the product of `dims`.
    pub fn from_real(dims: [usize; 3], values: &[f64]) -> Self {
        assert_eq!(values.len(), dims[0] * dims[1] * dims[2]);
        Self {
            dims,
            data: values.iter().map(|&v| Complex::new(v, 0.0)).collect(),
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn data(&self) -> &[Complex<f64>] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Complex<f64>] {
        &mut self.data
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z + self.dims[2] * (y + self.dims[1] * x)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Complex<f64> {
        self.data[self.index(x, y, z)]
    }

    /// Unnormalized forward transform (`exp(-2πi k·x/n)`).
    pub fn forward(&mut self) {
        let mut planner = FftPlanner::<f64>::new();
        self.transform(|n| planner.plan_fft_forward(n));
    }

    /// Unnormalized inverse transform; `forward` followed by `inverse` scales by `nx*ny*nz`.
    pub fn inverse(&mut self) {
        let mut planner = FftPlanner::<f64>::new();
        self.transform(|n| planner.plan_fft_inverse(n));
    }

    fn transform<P>(&mut self, mut plan: P)
    where
        P: FnMut(usize) -> std::sync::Arc<dyn rustfft::Fft<f64>>,
    {
        let [nx, ny, nz] = self.dims;
        if self.data.is_empty() {
            return;
        }

        // Innermost axis: contiguous lines of length nz.
        let fft_z = plan(nz);
        fft_z.process(&mut self.data);

        // Middle axis: lines of length ny with stride nz.
        let fft_y = plan(ny);
        let mut line = vec![Complex::new(0.0, 0.0); ny.max(nx)];
        for x in 0..nx {
            for z in 0..nz {
                for y in 0..ny {
                    line[y] = self.data[z + nz * (y + ny * x)];
                }
                fft_y.process(&mut line[..ny]);
                for y in 0..ny {
                    self.data[z + nz * (y + ny * x)] = line[y];
                }
            }
        }

        // Outermost axis: lines of length nx with stride ny*nz.
        let fft_x = plan(nx);
        for y in 0..ny {
            for z in 0..nz {
                for x in 0..nx {
                    line[x] = self.data[z + nz * (y + ny * x)];
                }
                fft_x.process(&mut line[..nx]);
                for x in 0..nx {
                    self.data[z + nz * (y + ny * x)] = line[x];
                }
            }
        }
    }
}
