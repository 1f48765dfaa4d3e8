const CPS_UNITS: [&str; 6] = ["", "K", "M", "G", "T", "P"];

/// Human readable counts-per-second, e.g. `1234.5` -> `"1.23K"`.
/// Decimals are truncated, not rounded.
pub fn format_cps(rate: f64) -> String {
    if !rate.is_finite() || rate <= 0.0 {
        return "0".to_string();
    }
    let magnitude = ((rate.log10() / 3.0).floor().max(0.0) as usize).min(CPS_UNITS.len() - 1);
    let scaled = rate / 1000f64.powi(magnitude as i32);

    let repr = scaled.to_string();
    let decimals = repr
        .split_once('.')
        .map_or("0", |(_, frac)| &frac[..frac.len().min(2)]);
    format!("{}.{}{}", scaled.trunc() as u64, decimals, CPS_UNITS[magnitude])
}
