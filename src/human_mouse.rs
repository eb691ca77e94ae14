use rand::Rng;
use std::time::Duration;

/// Largest sideways wobble of a control point, in pixels.
const WOBBLE: i32 = 20;

/// Points along a randomized cubic Bézier curve from `from` to `to`, ending exactly on `to`.
pub fn bezier_path<R: Rng>(rng: &mut R, from: (i32, i32), to: (i32, i32)) -> Vec<(i32, i32)> {
    let (start_x, start_y) = from;
    let (end_x, end_y) = to;

    // Control points a third and two thirds of the way, nudged off the straight line
    let control1_x = start_x + (end_x - start_x) / 3 + rng.gen_range(-WOBBLE..=WOBBLE);
    let control1_y = start_y + (end_y - start_y) / 3 + rng.gen_range(-WOBBLE..=WOBBLE);
    let control2_x = start_x + 2 * (end_x - start_x) / 3 + rng.gen_range(-WOBBLE..=WOBBLE);
    let control2_y = start_y + 2 * (end_y - start_y) / 3 + rng.gen_range(-WOBBLE..=WOBBLE);

    let dx = f64::from(end_x - start_x);
    let dy = f64::from(end_y - start_y);
    let steps = ((dx * dx + dy * dy).sqrt() / 2.0) as i32;
    let steps = steps.clamp(10, 50);

    let mut points: Vec<(i32, i32)> = (1..=steps)
        .map(|i| {
            let t = f64::from(i) / f64::from(steps);
            let u = 1.0 - t;
            let x = u.powi(3) * f64::from(start_x)
                + 3.0 * u.powi(2) * t * f64::from(control1_x)
                + 3.0 * u * t.powi(2) * f64::from(control2_x)
                + t.powi(3) * f64::from(end_x);
            let y = u.powi(3) * f64::from(start_y)
                + 3.0 * u.powi(2) * t * f64::from(control1_y)
                + 3.0 * u * t.powi(2) * f64::from(control2_y)
                + t.powi(3) * f64::from(end_y);
            (x.round() as i32, y.round() as i32)
        })
        .collect();
    // Float error must not leave the cursor a pixel short
    if let Some(last) = points.last_mut() {
        *last = to;
    }
    points
}

/// Short random pause between path points (5-15ms).
pub fn step_delay<R: Rng>(rng: &mut R) -> Duration { Duration::from_millis(rng.gen_range(5..=15)) }
