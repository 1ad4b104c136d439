//! Row-major `f32` tensors passed into and out of networks.

use std::fmt;

use tinyvec::TinyVec;

use crate::iter::zip_exact;

/// An owned N-dimensional array of `f32`, stored row-major.
///
/// Elements are read through [`TensorView`]s: [`Tensor::index`] fixes the leading dimensions,
/// after which a 1-dimensional view is read with `as_slice` and a 0-dimensional one with
/// `as_singular`.
#[derive(Clone)]
pub struct Tensor {
    shape: TinyVec<[usize; 8]>,
    data: Box<[f32]>,
}

impl Tensor {
    /// Builds a tensor by evaluating `f` at every index, in storage order.
    ///
    /// The last index component changes fastest: `[0, 0]`, `[0, 1]`, ..., `[1, 0]`, ...
    pub fn from_array_shape_fn<const N: usize>(
        shape: [usize; N],
        mut f: impl FnMut([usize; N]) -> f32,
    ) -> Self {
        let len: usize = shape.iter().product();
        let mut index = [0; N];
        let data = (0..len)
            .map(|_| {
                let value = f(index);
                advance(&mut index, &shape);
                value
            })
            .collect();

        Self {
            shape: shape[..].into(),
            data,
        }
    }

    /// Builds a tensor of the given shape from its elements in storage order.
    ///
    /// # Panics
    ///
    /// Panics if `elems` does not yield exactly the number of elements `shape` calls for.
    pub fn from_iter(shape: &[usize], elems: impl IntoIterator<Item = f32>) -> Self {
        let data: Box<[f32]> = elems.into_iter().collect();
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "element count {} does not fit tensor shape {shape:?}",
            data.len(),
        );
        Self {
            shape: shape.into(),
            data,
        }
    }

    pub(super) fn from_tract(tensor: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let elems = tensor.as_slice::<f32>()?;
        Ok(Self::from_iter(tensor.shape(), elems.iter().copied()))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        let tensor = tract_onnx::prelude::Tensor::from_shape(self.shape(), &self.data[..])?;
        Ok(tensor)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// A view of the whole tensor.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            data: &self.data,
        }
    }

    /// Fixes the first `N` dimensions.
    ///
    /// For a tensor of shape `[1, 896, 18]`, `index([0, 5])` is the 18-element row number 5.
    ///
    /// # Panics
    ///
    /// Panics if `N` exceeds the rank, or if an index is out of range.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }

    /// # Panics
    ///
    /// Panics unless the tensor is 1-dimensional.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        self.view().as_slice()
    }

    /// # Panics
    ///
    /// Panics unless the tensor is 0-dimensional.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        self.view().as_singular()
    }
}

/// Steps a row-major index to the next element.
fn advance(index: &mut [usize], shape: &[usize]) {
    for (i, &size) in zip_exact(index.iter_mut(), shape).rev() {
        *i += 1;
        if *i < size {
            return;
        }
        *i = 0;
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(elems: [f32; N]) -> Self {
        Self::from_iter(&[N], elems)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{:?}", self.shape())
    }
}

/// Borrowed part of a [`Tensor`], covering its trailing dimensions.
#[derive(Clone, Copy)]
pub struct TensorView<'a> {
    shape: &'a [usize],
    data: &'a [f32],
}

impl<'a> TensorView<'a> {
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Fixes the first `N` dimensions of this view. See [`Tensor::index`].
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'a> {
        let in_range = indices.len() <= self.rank()
            && indices.iter().zip(self.shape).all(|(&i, &size)| i < size);
        assert!(
            in_range,
            "attempted to index tensor of shape {:?} with {indices:?}",
            self.shape,
        );

        let shape = &self.shape[N..];
        let stride: usize = shape.iter().product();
        let offset = indices
            .iter()
            .zip(self.shape)
            .fold(0, |offset, (&i, &size)| offset * size + i);
        TensorView {
            shape,
            data: &self.data[offset * stride..][..stride],
        }
    }

    /// Views of each entry along the first dimension.
    ///
    /// # Panics
    ///
    /// Panics if the view is 0-dimensional.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'a>> + '_ {
        assert_ne!(self.rank(), 0, "cannot iterate over a scalar");
        (0..self.shape[0]).map(|i| self.index([i]))
    }

    /// # Panics
    ///
    /// Panics unless the view is 1-dimensional.
    #[track_caller]
    pub fn as_slice(&self) -> &'a [f32] {
        assert_eq!(
            self.rank(),
            1,
            "tensor view of shape {:?} is not 1-dimensional",
            self.shape
        );
        self.data
    }

    /// # Panics
    ///
    /// Panics unless the view is 0-dimensional.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "tensor view of shape {:?} is not a scalar",
            self.shape
        );
        self.data[0]
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorView{:?}", self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_fn_visits_in_storage_order() {
        let mut visited = Vec::new();
        let tensor = Tensor::from_array_shape_fn([2, 1, 3], |index| {
            visited.push(index);
            visited.len() as f32
        });
        assert_eq!(
            visited,
            [
                [0, 0, 0],
                [0, 0, 1],
                [0, 0, 2],
                [1, 0, 0],
                [1, 0, 1],
                [1, 0, 2],
            ]
        );
        assert_eq!(tensor.index([1, 0]).as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn zero_sized_dimension() {
        let tensor = Tensor::from_array_shape_fn([1, 0, 4], |_| panic!("no elements to visit"));
        assert_eq!(tensor.rank(), 3);
        assert_eq!(tensor.index([0]).iter().count(), 0);
    }

    #[test]
    fn scalar() {
        let tensor = Tensor::from_array_shape_fn([], |[]| 7.0);
        assert_eq!(tensor.shape(), &[] as &[usize]);
        assert_eq!(tensor.as_singular(), 7.0);
    }

    #[test]
    fn nested_indexing() {
        let tensor = Tensor::from_iter(&[2, 2, 2], (0..8).map(|i| i as f32));
        let plane = tensor.index([1]);
        assert_eq!(plane.shape(), &[2, 2]);
        assert_eq!(plane.index([0]).as_slice(), &[4.0, 5.0]);
        assert_eq!(plane.index([1, 1]).as_singular(), 7.0);
        assert_eq!(tensor.index([0, 1, 0]).as_singular(), 2.0);

        let firsts = tensor
            .view()
            .iter()
            .map(|plane| plane.index([0, 0]).as_singular())
            .collect::<Vec<_>>();
        assert_eq!(firsts, [0.0, 4.0]);
    }

    #[test]
    fn from_array() {
        let tensor = Tensor::from([0.5, 1.5]);
        assert_eq!(tensor.shape(), &[2]);
        assert_eq!(tensor.as_slice(), &[0.5, 1.5]);
        assert_eq!(tensor.index([1]).as_singular(), 1.5);
    }

    #[test]
    #[should_panic(expected = "attempted to index")]
    fn index_out_of_bounds() {
        Tensor::from([0.0, 1.0]).index([2]);
    }

    #[test]
    #[should_panic(expected = "attempted to index")]
    fn too_many_indices() {
        Tensor::from([0.0]).index([0, 0]);
    }

    #[test]
    #[should_panic(expected = "does not fit tensor shape")]
    fn from_iter_wrong_len() {
        Tensor::from_iter(&[2, 2], [1.0; 3]);
    }
}
