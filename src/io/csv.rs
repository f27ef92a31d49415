/*!
# Saving sampler outputs as CSV

Enable via the `csv` feature. Every function overwrites `path`.
*/

use std::path::Path;

use csv::Writer;
use ndarray::{Array2, ArrayView3, Axis};

use crate::error::SamplerError;

/**
Saves a thinned trace of shape **sample × rows × cols**.

The header row holds `"sample"` followed by one column per pixel, named
`"px_<row>_<col>"` in row-major order. Each further row is one snapshot.

# Examples

```rust
use ndarray::Array3;
use prox_mcmc::io::csv::save_trace_csv;

let trace = Array3::<f64>::zeros((10, 2, 2));
let file = tempfile::NamedTempFile::new()?;
save_trace_csv(trace.view(), file.path())?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
pub fn save_trace_csv<P: AsRef<Path>>(
    trace: ArrayView3<'_, f64>,
    path: P,
) -> Result<(), SamplerError> {
    let mut wtr = Writer::from_path(path)?;
    let (_, rows, cols) = trace.dim();

    let mut header = Vec::with_capacity(rows * cols + 1);
    header.push("sample".to_string());
    for r in 0..rows {
        header.extend((0..cols).map(|c| format!("px_{r}_{c}")));
    }
    wtr.write_record(&header)?;

    for (i, snapshot) in trace.axis_iter(Axis(0)).enumerate() {
        let mut row = Vec::with_capacity(rows * cols + 1);
        row.push(i.to_string());
        row.extend(snapshot.iter().map(|v| v.to_string()));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Saves an image in matrix layout: one CSV row per image row, no header.
pub fn save_image_csv<P: AsRef<Path>>(image: &Array2<f64>, path: P) -> Result<(), SamplerError> {
    let mut wtr = Writer::from_path(path)?;
    for row in image.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Saves named scalar series side by side, one column each, preceded by an
/// `"index"` column. Shorter series leave their trailing cells empty.
pub fn save_series_csv<P: AsRef<Path>>(
    series: &[(&str, &[f64])],
    path: P,
) -> Result<(), SamplerError> {
    let mut wtr = Writer::from_path(path)?;
    let mut header = vec!["index".to_string()];
    header.extend(series.iter().map(|(name, _)| name.to_string()));
    wtr.write_record(&header)?;

    let len = series.iter().map(|(_, s)| s.len()).max().unwrap_or(0);
    for i in 0..len {
        let mut row = vec![i.to_string()];
        row.extend(
            series
                .iter()
                .map(|(_, s)| s.get(i).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::Reader;
    use ndarray::{arr2, Array3};
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_save_trace_csv() -> Result<(), Box<dyn std::error::Error>> {
        let trace = Array3::from_shape_fn((3, 2, 2), |(s, i, j)| (s * 10 + i * 2 + j) as f64);
        let file = NamedTempFile::new()?;
        save_trace_csv(trace.view(), file.path())?;

        let mut rdr = Reader::from_path(file.path())?;
        let headers = rdr.headers()?.clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["sample", "px_0_0", "px_0_1", "px_1_0", "px_1_1"]
        );
        let records: Vec<_> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 3);
        assert_eq!(&records[2][0], "2");
        assert_eq!(&records[2][4], "23");
        Ok(())
    }

    #[test]
    fn test_save_empty_trace_csv() -> Result<(), Box<dyn std::error::Error>> {
        let trace = Array3::<f64>::zeros((0, 1, 2));
        let file = NamedTempFile::new()?;
        save_trace_csv(trace.view(), file.path())?;
        let contents = fs::read_to_string(file.path())?;
        assert_eq!(contents.trim(), "sample,px_0_0,px_0_1");
        Ok(())
    }

    #[test]
    fn test_save_image_csv() -> Result<(), Box<dyn std::error::Error>> {
        let image = arr2(&[[1.0, 2.5], [-3.0, 4.0]]);
        let file = NamedTempFile::new()?;
        save_image_csv(&image, file.path())?;
        let contents = fs::read_to_string(file.path())?;
        assert_eq!(contents.trim(), "1,2.5\n-3,4");
        Ok(())
    }

    #[test]
    fn test_save_series_csv_pads_short_columns() -> Result<(), Box<dyn std::error::Error>> {
        let log_p = [-1.0, -0.5, -0.25];
        let psnr = [20.0];
        let file = NamedTempFile::new()?;
        save_series_csv(&[("log_p", &log_p[..]), ("psnr", &psnr[..])], file.path())?;
        let contents = fs::read_to_string(file.path())?;
        let expected = "\
index,log_p,psnr
0,-1,20
1,-0.5,
2,-0.25,";
        assert_eq!(contents.trim(), expected);
        Ok(())
    }
}
