/// Display aspect ratio (height / width) for dashboard stills.
const ASPECT: f32 = 9.0 / 16.0;
/// Share of the container the image may occupy.
const FILL: f32 = 0.95;

/// Largest 16:9 size that fits the container, keeping a 5% margin.
pub fn fit_frame(container_width: f32, container_height: f32) -> (f32, f32) {
    let mut width = container_width * FILL;
    let mut height = width * ASPECT;
    if height > container_height {
        height = container_height * FILL;
        width = height / ASPECT;
    }
    (width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_container_is_limited_by_height() {
        let (width, height) = fit_frame(2000.0, 500.0);
        assert!((height - 475.0).abs() < 1e-3);
        assert!((width - 475.0 * 16.0 / 9.0).abs() < 1e-2);
    }

    #[test]
    fn tall_container_is_limited_by_width() {
        let (width, height) = fit_frame(1000.0, 1000.0);
        assert!((width - 950.0).abs() < 1e-3);
        assert!((height - 534.375).abs() < 1e-3);
    }
}
