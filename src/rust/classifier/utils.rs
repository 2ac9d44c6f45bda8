use ndarray::Array1;

/// Numerically stable softmax over a logit vector.
pub(crate) fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    if logits.is_empty() {
        return Array1::zeros(0);
    }
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.mapv(|x| (x - max).exp());
    let sum: f32 = exps.sum();
    if sum > 1e-10 {
        exps / sum
    } else {
        Array1::zeros(logits.len())
    }
}

/// Index of the largest value; the first one wins on ties. NaN entries are never chosen.
pub(crate) fn argmax(values: &Array1<f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&array![2.0, 1.0, 0.1, -1.0, 3.5]);
        assert!((probs.sum() - 1.0).abs() < 1e-5);
        assert_eq!(argmax(&probs), Some(4));
    }

    #[test]
    fn test_argmax_ties_and_nan() {
        assert_eq!(argmax(&array![1.0, 1.0, 0.5]), Some(0));
        assert_eq!(argmax(&array![f32::NAN, 0.2, 0.1]), Some(1));
        assert_eq!(argmax(&Array1::<f32>::zeros(0)), None);
    }
}
