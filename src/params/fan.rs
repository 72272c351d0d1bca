use crate::error::{Result, ShapeErr};

/// Computes the fan-in and fan-out of a weight tensor.
///
/// The shape is read as `(out_features, in_features, *kernel_dims)`: each input unit feeds
/// every entry of the kernel's receptive field, so both fans are scaled by its size.
///
/// # Arguments
/// * `shape` - The full shape of the weight tensor.
///
/// # Returns
/// A `(fan_in, fan_out)` tuple, or an error if the tensor has fewer than 2 dimensions.
pub fn fan_in_and_fan_out(shape: &[usize]) -> Result<(usize, usize)> {
    let [out_features, in_features, kernel @ ..] = shape else {
        return Err(ShapeErr::TooFewDims { got: shape.len() }.into());
    };

    let receptive_field = numel(kernel);
    Ok((in_features * receptive_field, out_features * receptive_field))
}

/// Returns the number of scalar entries of a tensor with the given shape.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}
