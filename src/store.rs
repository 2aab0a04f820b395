use camino::{Utf8Path, Utf8PathBuf};

#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: Utf8PathBuf,
}

impl DataStore {
    pub fn new(data_dir: Utf8PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    pub fn series_csv_path(&self, series_code: &str) -> Utf8PathBuf {
        self.data_dir.join(format!("{series_code}_cube.pivot.csv"))
    }

    pub fn has_series_csv(&self, series_code: &str) -> bool {
        self.series_csv_path(series_code).as_std_path().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = DataStore::new(Utf8PathBuf::from("FIS4SDGs/csv"));
        assert_eq!(
            store.series_csv_path("SI_POV_DAY1"),
            Utf8PathBuf::from("FIS4SDGs/csv/SI_POV_DAY1_cube.pivot.csv")
        );
    }

    #[test]
    fn csv_presence_gate() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = DataStore::new(root.clone());
        assert!(!store.has_series_csv("SI_POV_DAY1"));
        std::fs::write(
            root.join("SI_POV_DAY1_cube.pivot.csv").as_std_path(),
            "series_code,geoAreaName\nSI_POV_DAY1,World\n",
        )
        .unwrap();
        assert!(store.has_series_csv("SI_POV_DAY1"));
    }
}
