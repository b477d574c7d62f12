use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Instant,
};

use rayon::prelude::*;

use pcd_core::Transform as _;

use crate::{error::Error, format::Format, options::ConvertOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl ConversionJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<ConversionJob>,
    pub failures: Vec<(ConversionJob, Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decodes `input`, applies the configured transforms and encodes `output`.
///
/// Both formats are resolved from the file extensions before anything is
/// read, so an unsupported extension never leaves a partial output behind.
pub fn convert_file(input: &Path, output: &Path, options: &ConvertOptions) -> Result<(), Error> {
    let input_format = Format::from_path(input)?;
    let output_format = Format::from_path(output)?;
    if !output_format.can_encode() {
        return Err(Error::UnsupportedOperation {
            path: output.to_path_buf(),
            format: output_format,
            operation: "encoding",
        });
    }

    log::info!(
        "converting {:?} ({}) -> {:?} ({})",
        input,
        input_format,
        output,
        output_format
    );

    let start = Instant::now();
    let mut record = options.adapter(input_format).decode(input)?;
    log::info!("decoded {} points in {:?}", record.len(), start.elapsed());

    let transform = options.transform();
    if !transform.is_empty() {
        let start = Instant::now();
        transform
            .apply(&mut record)
            .map_err(|source| Error::Transform {
                path: input.to_path_buf(),
                source,
            })?;
        log::info!("transformed in {:?}", start.elapsed());
    }

    let start = Instant::now();
    options.adapter(output_format).encode(&record, output)?;
    log::info!("encoded {:?} in {:?}", output, start.elapsed());

    Ok(())
}

/// Runs every job in parallel. A failing job is reported and never stops
/// the others.
///
/// Jobs that share an output path are not run; each of them is reported as
/// a [`Error::DuplicateOutput`] failure.
pub fn convert_batch(jobs: Vec<ConversionJob>, options: &ConvertOptions) -> BatchReport {
    let start = Instant::now();
    let total = jobs.len();

    let mut writers: HashMap<PathBuf, usize> = HashMap::new();
    for job in &jobs {
        *writers.entry(job.output.clone()).or_default() += 1;
    }

    let results: Vec<(ConversionJob, Result<(), Error>)> = jobs
        .into_par_iter()
        .map(|job| {
            let result = match writers[&job.output] {
                1 => convert_file(&job.input, &job.output, options),
                jobs => Err(Error::DuplicateOutput {
                    path: job.output.clone(),
                    jobs,
                }),
            };
            (job, result)
        })
        .collect();

    let mut report = BatchReport::default();
    for (job, result) in results {
        match result {
            Ok(()) => report.converted.push(job),
            Err(e) => {
                log::error!("failed to convert {:?}: {}", job.input, error_chain(&e));
                report.failures.push((job, e));
            }
        }
    }

    log::info!(
        "converted {}/{} files in {:?} ({} failed)",
        report.converted.len(),
        total,
        start.elapsed(),
        report.failures.len()
    );

    report
}

/// The error and all of its sources on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_input_fails_before_touching_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pcd");

        let err = convert_file(Path::new("mesh.ply"), &output, &ConvertOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert_eq!(err.path(), Path::new("mesh.ply"));
        assert!(!output.exists());
    }

    #[test]
    fn hdf5_output_is_rejected_up_front() {
        let err = convert_file(
            Path::new("missing.las"),
            Path::new("out.h5"),
            &ConvertOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::UnsupportedOperation {
                format: Format::Hdf5,
                ..
            }
        ));
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = Error::InvalidRecord {
            path: PathBuf::from("a.csv"),
            source: pcd_core::RecordError::EmptyCloud,
        };
        assert_eq!(
            error_chain(&err),
            "a.csv: invalid point cloud: point cloud has no points"
        );
    }

    #[test]
    fn jobs_sharing_an_output_are_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let (las_input, csv_input) = (dir.path().join("tree.las"), dir.path().join("tree.csv"));
        std::fs::write(&csv_input, "x,y,z\n1,2,3\n").unwrap();
        let shared = dir.path().join("tree.pcd");
        let unique = dir.path().join("csv_tree.las");

        let report = convert_batch(
            vec![
                ConversionJob::new(&las_input, &shared),
                ConversionJob::new(&csv_input, &shared),
                ConversionJob::new(&csv_input, &unique),
            ],
            &ConvertOptions::default(),
        );

        assert_eq!(report.converted, vec![ConversionJob::new(&csv_input, &unique)]);
        assert_eq!(report.failures.len(), 2);
        for (job, err) in &report.failures {
            assert_eq!(job.output, shared);
            assert!(matches!(err, Error::DuplicateOutput { jobs: 2, .. }));
        }
        assert!(!shared.exists());
        assert!(unique.exists());
    }
}
