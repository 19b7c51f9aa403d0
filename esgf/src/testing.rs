use std::{
    collections::{HashMap, HashSet},
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    array::{ArraySource, Kind, Label, LazyArray, Values},
    batch::Batch,
    dataset::{Dataset, Variable},
    errors::{Error, Result},
    file::{FileDescriptor, Location},
    identity::IdentityKey,
    services::{Checker, FileStatus, Reader, Retriever},
};

pub(crate) const TAS_245: &str =
    "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp245.r1i1p1f1.Amon.tas.gr.v20210113";
pub(crate) const TAS_585: &str =
    "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp585.r1i1p1f1.Amon.tas.gr.v20210113";
pub(crate) const PR_245: &str =
    "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp245.r1i1p1f1.Amon.pr.gr.v20210113";
pub(crate) const PR_585: &str =
    "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp585.r1i1p1f1.Amon.pr.gr.v20210113";
pub(crate) const AREA_245: &str =
    "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp245.r1i1p1f1.fx.areacella.gr.v20210113";
pub(crate) const AREA_585: &str =
    "CMIP6.ScenarioMIP.EC-Earth-Consortium.EC-Earth3-CC.ssp585.r1i1p1f1.fx.areacella.gr.v20210113";

pub(crate) const LAT: [f64; 2] = [-45.0, 45.0];
pub(crate) const LON: [f64; 3] = [0.0, 120.0, 240.0];

pub(crate) fn labels(values: &[f64]) -> Vec<Label> {
    values.iter().map(|value| Label::Float(*value)).collect()
}

pub(crate) fn text_labels(values: &[&str]) -> Vec<Label> {
    values.iter().map(|value| Label::from(*value)).collect()
}

/// A test implementation of ArraySource that keeps arrays in RAM and counts reads
///
pub(crate) struct CountingSource {
    arrays: Mutex<HashMap<String, Values>>,
    reads: AtomicUsize,
}

impl CountingSource {
    pub(crate) fn new() -> Self {
        Self {
            arrays: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn insert<S: Into<String>>(&self, name: S, values: Values) {
        self.arrays.lock().insert(name.into(), values);
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ArraySource for CountingSource {
    fn read(&self, name: &str) -> Result<Values> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.arrays.lock().get(name).cloned().ok_or_else(|| {
            Error::IO(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no array named {name}"),
            ))
        })
    }
}

/// A file descriptor the way an ESGF index node would describe it
pub(crate) fn descriptor(dataset_id: &str, filename: &str) -> FileDescriptor {
    let tokens: Vec<&str> = dataset_id.split('.').collect();
    let local_path: PathBuf = tokens.iter().collect();
    let facets = IdentityKey::ALL
        .iter()
        .zip(&tokens)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    FileDescriptor {
        dataset_id: dataset_id.to_string(),
        filename: filename.to_string(),
        url: format!(
            "https://esgf.example.org/thredds/fileServer/{}/{filename}",
            tokens.join("/")
        ),
        local_path,
        size: 1024,
        checksum: None,
        checksum_type: None,
        facets,
    }
}

/// File name of one year of monthly CMIP output
pub(crate) fn cmip_filename(variable: &str, experiment: &str, year: i64) -> String {
    format!("{variable}_Amon_EC-Earth3-CC_{experiment}_r1i1p1f1_gr_{year}01-{year}12.nc")
}

pub(crate) fn areacella_filename(experiment: &str) -> String {
    format!("areacella_fx_EC-Earth3-CC_{experiment}_r1i1p1f1_gr.nc")
}

/// The ten files of two experiments, each with two years of tas and pr plus a cell area file
pub(crate) fn scenario_files() -> Vec<FileDescriptor> {
    let mut files = vec![];
    for (variable, ids) in [("tas", [TAS_245, TAS_585]), ("pr", [PR_245, PR_585])] {
        for (experiment, dataset_id) in ["ssp245", "ssp585"].into_iter().zip(ids) {
            for year in [2019, 2020] {
                files.push(descriptor(
                    dataset_id,
                    &cmip_filename(variable, experiment, year),
                ));
            }
        }
    }
    files.push(descriptor(AREA_245, &areacella_filename("ssp245")));
    files.push(descriptor(AREA_585, &areacella_filename("ssp585")));

    files
}

/// A reader that can open every file of `scenario_files`
pub(crate) fn scenario_reader() -> Result<MemoryReader> {
    let reader = MemoryReader::new();
    for variable in ["tas", "pr"] {
        for experiment in ["ssp245", "ssp585"] {
            for year in [2019, 2020] {
                reader.insert_cmip(&cmip_filename(variable, experiment, year), variable, year)?;
            }
        }
    }
    for experiment in ["ssp245", "ssp585"] {
        reader.insert_areacella(&areacella_filename(experiment))?;
    }

    Ok(reader)
}

fn coordinate(dim: &str, values: &[f64]) -> Result<Variable> {
    Variable::new([dim], Values::from_f64(&[values.len()], values.to_vec())?)
}

fn bounds(dim: &str, centers: &[f64], width: f64) -> Result<Variable> {
    let data = centers
        .iter()
        .flat_map(|center| [center - width / 2.0, center + width / 2.0])
        .collect();
    Variable::new(
        [dim, "bnds"],
        Values::from_f64(&[centers.len(), 2], data)?,
    )
}

/// A test implementation of Reader that opens in-memory datasets, by file name
///
/// Data variables are backed by a shared `CountingSource`, so tests can tell whether anything was
/// read.
///
pub(crate) struct MemoryReader {
    datasets: Mutex<HashMap<String, Dataset>>,
    source: Arc<CountingSource>,
    opens: AtomicUsize,
    locations: Mutex<Vec<Location>>,
}

impl MemoryReader {
    pub(crate) fn new() -> Self {
        Self {
            datasets: Mutex::new(HashMap::new()),
            source: Arc::new(CountingSource::new()),
            opens: AtomicUsize::new(0),
            locations: Mutex::new(vec![]),
        }
    }

    pub(crate) fn insert(&self, filename: &str, dataset: Dataset) {
        self.datasets.lock().insert(filename.to_string(), dataset);
    }

    /// One year of monthly `variable` on a 2 x 3 grid, stored in half year blocks
    ///
    /// Time is labeled in days since 2019-01-01, with 30 day months, at the middle of each month.
    /// Bounds arrays are data variables, as they are in the raw files.
    ///
    pub(crate) fn insert_cmip(&self, filename: &str, variable: &str, year: i64) -> Result<()> {
        let start = ((year - 2019) * 360) as f64;
        let time: Vec<f64> = (0..12).map(|month| start + (month * 30 + 15) as f64).collect();
        let offset = if filename.contains("ssp585") { 1000.0 } else { 0.0 };

        let shape = vec![12, LAT.len(), LON.len()];
        let size: usize = shape.iter().product();
        let name = format!("{filename}/{variable}");
        self.source.insert(
            name.clone(),
            Values::from_f64(
                &shape,
                (0..size).map(|i| start + offset + i as f64).collect(),
            )?,
        );
        let data = LazyArray::from_source(self.source.clone(), name, Kind::F64, shape)
            .with_chunks(vec![vec![6, 6], vec![LAT.len()], vec![LON.len()]])?;
        let units = if variable == "tas" { "K" } else { "kg m-2 s-1" };
        let payload = Variable::new(["time", "lat", "lon"], data)?
            .with_attr("units", units)
            .with_encoding("dtype", "float32")
            .with_encoding("source", filename);

        let mut dataset = Dataset::new()
            .with_coord(
                "time",
                coordinate("time", &time)?
                    .with_attr("units", "days since 2019-01-01")
                    .with_encoding("calendar", "360_day"),
            )?
            .with_coord("lat", coordinate("lat", &LAT)?)?
            .with_coord("lon", coordinate("lon", &LON)?)?
            .with_data_var("time_bnds", bounds("time", &time, 30.0)?)?
            .with_data_var("lat_bnds", bounds("lat", &LAT, 90.0)?)?
            .with_data_var("lon_bnds", bounds("lon", &LON, 120.0)?)?
            .with_data_var(variable, payload)?
            .with_attr("variable_id", variable)
            .with_attr("frequency", "mon")
            .with_attr("tracking_id", filename);
        if variable == "tas" {
            dataset = dataset.with_coord(
                "height",
                Variable::new(Vec::<String>::new(), Values::scalar(Label::Float(2.0)))?
                    .with_attr("units", "m"),
            )?;
        }
        dataset.encoding.insert("source".to_string(), filename.into());
        self.insert(filename, dataset);

        Ok(())
    }

    /// Grid cell areas, with no time axis
    pub(crate) fn insert_areacella(&self, filename: &str) -> Result<()> {
        let shape = vec![LAT.len(), LON.len()];
        let name = format!("{filename}/areacella");
        self.source
            .insert(name.clone(), Values::from_f64(&shape, vec![1.0e10; 6])?);
        let data = LazyArray::from_source(self.source.clone(), name, Kind::F64, shape);

        let mut dataset = Dataset::new()
            .with_coord("lat", coordinate("lat", &LAT)?)?
            .with_coord("lon", coordinate("lon", &LON)?)?
            .with_data_var("lat_bnds", bounds("lat", &LAT, 90.0)?)?
            .with_data_var("lon_bnds", bounds("lon", &LON, 120.0)?)?
            .with_data_var(
                "areacella",
                Variable::new(["lat", "lon"], data)?.with_attr("units", "m2"),
            )?
            .with_attr("variable_id", "areacella")
            .with_attr("frequency", "fx");
        dataset.encoding.insert("source".to_string(), filename.into());
        self.insert(filename, dataset);

        Ok(())
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn reads(&self) -> usize {
        self.source.reads()
    }

    /// Every location opened so far, in order
    pub(crate) fn locations(&self) -> Vec<Location> {
        self.locations.lock().clone()
    }
}

impl Reader for MemoryReader {
    fn open(&self, location: &Location, drop_variables: &[String]) -> Result<Dataset> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.locations.lock().push(location.clone());

        let filename = match location {
            Location::Remote(url) => url.rsplit('/').next().unwrap_or(url).to_string(),
            Location::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        let dataset = self.datasets.lock().get(&filename).cloned().ok_or_else(|| {
            Error::IO(io::Error::new(
                io::ErrorKind::NotFound,
                format!("cannot open {location}"),
            ))
        })?;

        Ok(dataset.drop_vars(drop_variables))
    }
}

#[derive(Default)]
struct StoreState {
    present: HashSet<String>,
    corrupt: HashSet<String>,
    bad_source: HashSet<String>,
    failures: HashMap<String, usize>,
    requested: Vec<usize>,
}

/// A test implementation of Retriever and Checker that keeps track of "downloaded" files in RAM
///
pub(crate) struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Number of download requests made
    pub(crate) fn requests(&self) -> usize {
        self.state.lock().requested.len()
    }

    /// Number of files in each download request, in order
    pub(crate) fn requested(&self) -> Vec<usize> {
        self.state.lock().requested.clone()
    }

    /// Make the next `times` transfers of `file` fail
    pub(crate) fn fail(&self, file: &FileDescriptor, times: usize) {
        self.state.lock().failures.insert(file.file_id(), times);
    }

    /// Damage the local copy of `file`, which must already be present
    pub(crate) fn corrupt(&self, file: &FileDescriptor) {
        self.state.lock().corrupt.insert(file.file_id());
    }

    /// Make every transfer of `file` succeed while leaving a damaged copy behind
    pub(crate) fn serve_corrupt(&self, file: &FileDescriptor) {
        self.state.lock().bad_source.insert(file.file_id());
    }
}

#[async_trait]
impl Retriever for MemoryStore {
    async fn download(
        &self,
        files: &[FileDescriptor],
        _show_progress: bool,
    ) -> Batch<FileDescriptor> {
        let mut state = self.state.lock();
        state.requested.push(files.len());

        let mut batch = Batch::new();
        for file in files {
            let id = file.file_id();
            match state.failures.get_mut(&id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    let err = Error::Transfer {
                        url: file.url.clone(),
                        source: "connection reset by peer".into(),
                    };
                    batch.push_err(file.clone(), Some(err));
                }
                _ => {
                    if state.bad_source.contains(&id) {
                        state.corrupt.insert(id.clone());
                    } else {
                        state.corrupt.remove(&id);
                    }
                    state.present.insert(id);
                    batch.push_ok(file.clone());
                }
            }
        }

        batch
    }
}

#[async_trait]
impl Checker for MemoryStore {
    async fn check(&self, file: &FileDescriptor) -> FileStatus {
        let state = self.state.lock();
        let id = file.file_id();
        if !state.present.contains(&id) {
            FileStatus::Missing
        } else if state.corrupt.contains(&id) {
            FileStatus::Corrupt
        } else {
            FileStatus::Ok
        }
    }

    async fn exists(&self, file: &FileDescriptor) -> bool {
        self.state.lock().present.contains(&file.file_id())
    }
}
