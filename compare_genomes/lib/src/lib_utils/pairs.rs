// Compare two distance matrices over the accessions they share

use std::io::Write;
use std::ops::RangeInclusive;
use log::info;
use statrs::distribution::{ContinuousCDF, StudentsT};
use super::distance_matrix::{align_common, DistanceMatrix};
use super::error::{MatrixError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DistancePair {
    pub first: String,
    pub second: String,
    pub first_distance: f64,
    pub second_distance: f64,
}

// Upper-triangle pairs whose distances fall inside both ranges
pub fn filter_pairs(a: &DistanceMatrix, b: &DistanceMatrix,
                    range_a: RangeInclusive<f64>, range_b: RangeInclusive<f64>) -> Result<Vec<DistancePair>> {
    let (a, b) = align_common(a, b)?;
    let pairs: Vec<DistancePair> = a.upper_triangle()
        .filter_map(|(i, j, da)| {
            let db = b.get(i, j);
            (range_a.contains(&da) && range_b.contains(&db)).then(|| DistancePair {
                first: a.ids()[i].clone(),
                second: a.ids()[j].clone(),
                first_distance: da,
                second_distance: db,
            })
        })
        .collect();
    info!("Found {} pairs matching the criteria", pairs.len());
    Ok(pairs)
}

pub fn write_pairs<W: Write>(writer: &mut W, pairs: &[DistancePair]) -> Result<()> {
    writeln!(writer, "Acc1\tAcc2\tDM1_dist\tDM2_dist")?;
    for p in pairs {
        writeln!(writer, "{}\t{}\t{:.4}\t{:.4}", p.first, p.second, p.first_distance, p.second_distance)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
    pub n: usize,
}

// Pearson correlation of every cell of the two aligned matrices
pub fn pearson(a: &DistanceMatrix, b: &DistanceMatrix) -> Result<Correlation> {
    let (a, b) = align_common(a, b)?;
    pearson_values(a.values(), b.values())
}

// two-sided p-value from t = r * sqrt((n - 2) / (1 - r^2)) with n - 2 degrees of freedom
pub fn pearson_values(x: &[f64], y: &[f64]) -> Result<Correlation> {
    if x.len() != y.len() {
        return Err(MatrixError::Dimension(format!("{} values against {}", x.len(), y.len())));
    }
    let n = x.len();
    if n < 2 {
        return Err(MatrixError::InvalidInput("need at least two values to correlate".to_string()));
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let (dx, dy) = (xi - mean_x, yi - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return Err(MatrixError::InvalidInput("distance matrix has zero variance".to_string()));
    }
    let coefficient = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    let p_value = students_t_p_value(coefficient, n)?;
    info!("Pearson correlation coefficient: {} (p = {:.2e}) over {} values", coefficient, p_value, n);
    Ok(Correlation { coefficient, p_value, n })
}

fn students_t_p_value(r: f64, n: usize) -> Result<f64> {
    if n < 3 {
        return Ok(1.0);
    }
    let unexplained = 1.0 - r * r;
    if unexplained <= 0.0 {
        return Ok(0.0);
    }
    let freedom = (n - 2) as f64;
    let t = r * (freedom / unexplained).sqrt();
    let dist = StudentsT::new(0.0, 1.0, freedom)
        .map_err(|e| MatrixError::InvalidInput(format!("t distribution with {} degrees of freedom: {}", freedom, e)))?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(ids: &[&str], values: &[f64]) -> DistanceMatrix {
        DistanceMatrix::new(ids.iter().map(|s| s.to_string()).collect(), values.to_vec()).unwrap()
    }

    #[test]
    fn filters_pairs_in_both_ranges() {
        let a = matrix(&["A", "B", "C"], &[0.0, 1.1, 0.3, 1.1, 0.0, 1.0, 0.3, 1.0, 0.0]);
        let b = matrix(&["C", "B", "A"], &[0.0, 0.6, 0.6, 0.6, 0.0, 0.55, 0.6, 0.55, 0.0]);
        let pairs = filter_pairs(&a, &b, 1.0..=1.2, 0.5..=0.7).unwrap();
        let names: Vec<(&str, &str)> = pairs.iter().map(|p| (p.first.as_str(), p.second.as_str())).collect();
        assert_eq!(names, vec![("A", "B"), ("B", "C")]);
        assert_eq!(pairs[0].second_distance, 0.55);

        let mut out = Vec::new();
        write_pairs(&mut out, &pairs[..1]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Acc1\tAcc2\tDM1_dist\tDM2_dist\nA\tB\t1.1000\t0.5500\n");
    }

    #[test]
    fn pearson_of_scaled_matrix_is_one() {
        let a = matrix(&["A", "B", "C"], &[0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 2.0, 3.0, 0.0]);
        let b = matrix(&["A", "B", "C"], &[0.0, 2.0, 4.0, 2.0, 0.0, 6.0, 4.0, 6.0, 0.0]);
        let r = pearson(&a, &b).unwrap();
        assert!((r.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(r.p_value, 0.0);
        assert_eq!(r.n, 9);
    }

    #[test]
    fn pearson_p_value_matches_t_test() {
        // r = 0.8 over five points, two-sided p with 3 degrees of freedom
        let r = pearson_values(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 1.0, 4.0, 3.0, 5.0]).unwrap();
        assert!((r.coefficient - 0.8).abs() < 1e-12);
        assert!((r.p_value - 0.104088).abs() < 1e-5);
    }

    #[test]
    fn pearson_of_two_points_is_not_significant() {
        let r = pearson_values(&[1.0, 2.0], &[3.0, 5.0]).unwrap();
        assert_eq!(r.p_value, 1.0);
        assert!(pearson_values(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn pearson_rejects_constant_matrix() {
        let a = matrix(&["A"], &[0.0]);
        assert!(pearson(&a, &a).is_err());
    }
}
