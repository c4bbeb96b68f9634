use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{
    layout_from_lsh_forest, parse_smiles, render, ColumnData, CompoundTable, DataError, FeatureTable, Fingerprint,
    LshForest, MinHash, RowPolicy, Toolbox, TreemapConfig, TreemapError,
};

/// Augmented compound table written next to the drawing.
pub const DATA_FILE: &str = "data.csv";
/// Serialized [`Layout`](crate::Layout).
pub const LAYOUT_FILE: &str = "layout.json";
/// Log file the command line tool mirrors its output into.
pub const LOG_FILE: &str = "tmap.log";
/// Column added when a library has nothing to color by.
pub const PLACEHOLDER_COLUMN: &str = "random_value";

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapSummary {
    /// Compounds laid out.
    pub compounds: usize,
    /// Ids of rows left out because their structure did not parse.
    pub skipped: Vec<String>,
    pub data_path: PathBuf,
    pub layout_path: PathBuf,
    pub render_path: PathBuf,
}

/// Build a tree map of `config.library` into `config.output`.
///
/// Writes `data.csv`, `layout.json` and the drawing (`tmap.html` or
/// `tmap.svg`). Fingerprint and descriptor names are resolved in `toolbox`.
pub fn draw_tmap(config: &TreemapConfig, toolbox: &Toolbox) -> Result<TreemapSummary, TreemapError> {
    config.validate(toolbox)?;
    std::fs::create_dir_all(&config.output).map_err(TreemapError::io(&config.output))?;

    info!("library file: {}", config.library.display());
    info!("output folder path: {}", config.output.display());
    info!("fingerprint: {} ({} dimensions)", config.fingerprint, config.dimension);
    info!("chemical descriptors: {:?}", config.descriptors);
    info!(
        "additional feature file: {}",
        config
            .features
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let mut table = CompoundTable::read_csv(&config.library)?;
    debug!("loaded {} compounds", table.len());

    let skipped = drop_invalid_structures(&mut table, config.row_policy)?;
    if table.is_empty() {
        return Err(DataError::EmptyLibrary.into());
    }

    for name in &config.descriptors {
        let values = compute_descriptor(&table, toolbox, name, config.row_policy)?;
        table.add_column(name.clone(), ColumnData::Float(values))?;
        debug!("additional descriptor {name} added");
    }

    if let Some(path) = &config.features {
        let features = FeatureTable::read_csv(path)?;
        let dropped = table.left_join(&features);
        debug!(
            "joined {} feature columns from {}",
            features.columns().len() - dropped.len(),
            path.display()
        );
    }

    if !table.has_features() {
        warn!("no feature columns for compound library, adding random numbers as placeholder");
        add_placeholder_column(&mut table, config.seed)?;
    }

    let data_path = config.output.join(DATA_FILE);
    table.write_csv(&data_path)?;
    debug!("saved library table to {}", data_path.display());

    let generator = toolbox.fingerprints.get(&config.fingerprint)?;
    let fingerprints = table
        .ids()
        .iter()
        .zip(table.smiles())
        .map(|(id, smiles)| {
            generator(smiles, config.dimension).map_err(|source| DataError::InvalidSmiles {
                id: id.clone(),
                smiles: smiles.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!("computed {} {} fingerprints", fingerprints.len(), config.fingerprint);

    let vectors = to_minhash_space(fingerprints, config.dimension, config.seed)?;
    let mut forest = LshForest::new(config.dimension, config.trees)?;
    forest.batch_add(vectors)?;
    forest.index();

    let layout = layout_from_lsh_forest(&forest, &config.layout_config())?;
    debug!("tmap layout calculated");

    let layout_path = config.output.join(LAYOUT_FILE);
    layout.save(&layout_path)?;
    debug!("layout data (x, y, s, t) saved to {}", layout_path.display());

    let render_path = render::draw(config.render_mode, &layout, &table, &config.output)?;
    info!("tmap drawn to {}", render_path.display());

    Ok(TreemapSummary {
        compounds: table.len(),
        skipped,
        data_path,
        layout_path,
        render_path,
    })
}

/// Parse every structure, removing (or, when strict, failing on) the rows
/// that do not parse. Returns the removed ids.
fn drop_invalid_structures(table: &mut CompoundTable, policy: RowPolicy) -> Result<Vec<String>, TreemapError> {
    let mut keep = Vec::with_capacity(table.len());
    let mut skipped = Vec::new();
    for (id, smiles) in table.ids().iter().zip(table.smiles()) {
        match parse_smiles(smiles) {
            Ok(_) => keep.push(true),
            Err(source) => {
                let error = DataError::InvalidSmiles {
                    id: id.clone(),
                    smiles: smiles.clone(),
                    source: source.clone().into(),
                };
                if policy == RowPolicy::Strict {
                    return Err(error.into());
                }
                warn!("skipping row: {error}: {source}");
                keep.push(false);
                skipped.push(id.clone());
            }
        }
    }
    if !skipped.is_empty() {
        warn!("skipped {} of {} compounds with invalid structures", skipped.len(), keep.len());
        table.retain_rows(&keep);
    }
    Ok(skipped)
}

fn compute_descriptor(
    table: &CompoundTable,
    toolbox: &Toolbox,
    name: &str,
    policy: RowPolicy,
) -> Result<Vec<Option<f64>>, TreemapError> {
    let descriptor = toolbox.descriptors.get(name)?;
    let mut values = Vec::with_capacity(table.len());
    for (id, smiles) in table.ids().iter().zip(table.smiles()) {
        match descriptor(smiles) {
            Ok(value) => values.push(Some(value)),
            Err(source) => {
                let error = DataError::Descriptor {
                    id: id.clone(),
                    descriptor: name.to_string(),
                    source: source.clone(),
                };
                if policy == RowPolicy::Strict {
                    return Err(error.into());
                }
                warn!("{error}: {source}; recording a missing value");
                values.push(None);
            }
        }
    }
    Ok(values)
}

fn add_placeholder_column(table: &mut CompoundTable, seed: u64) -> Result<(), TreemapError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..table.len()).map(|_| Some(rng.gen::<f64>())).collect();
    table.add_column(PLACEHOLDER_COLUMN, ColumnData::Float(values))
}

/// MinHash-encode bit fingerprints in one batch; MinHash fingerprints pass
/// through. Row order is kept.
fn to_minhash_space(fingerprints: Vec<Fingerprint>, dimension: usize, seed: u64) -> Result<Vec<Vec<u32>>, TreemapError> {
    if let Some(fingerprint) = fingerprints.iter().find(|f| f.len() != dimension) {
        return Err(TreemapError::Index(format!(
            "fingerprint has {} positions, expected {dimension}",
            fingerprint.len()
        )));
    }

    let mut vectors = Vec::with_capacity(fingerprints.len());
    let mut bit_rows = Vec::new();
    let mut arrays = Vec::new();
    for (row, fingerprint) in fingerprints.into_iter().enumerate() {
        match fingerprint {
            Fingerprint::MinHash(values) => vectors.push(values),
            Fingerprint::Bits(bits) => {
                bit_rows.push(row);
                arrays.push(bits);
                vectors.push(Vec::new());
            }
        }
    }
    if !arrays.is_empty() {
        let encoded = MinHash::new(dimension, seed).batch_from_binary_array(&arrays);
        debug!("minhash-encoded {} bit vectors", encoded.len());
        for (row, vector) in bit_rows.into_iter().zip(encoded) {
            vectors[row] = vector;
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeneratorError, Layout, RenderMode};
    use std::fs;
    use std::path::Path;

    fn library(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("library.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    fn config(dir: &Path, contents: &str) -> TreemapConfig {
        let mut config = TreemapConfig::new(library(dir, contents), dir.join("out"));
        config.dimension = 128;
        config
    }

    #[test]
    fn test_two_compounds_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "id,smiles\n1,CCO\n2,CCN\n");
        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();

        assert_eq!(summary.compounds, 2);
        assert!(summary.skipped.is_empty());

        let data = fs::read_to_string(&summary.data_path).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "id,smiles,random_value");

        let layout = Layout::load(&summary.layout_path).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.y.len(), 2);
        assert_eq!(layout.edge_count(), 1);

        assert_eq!(summary.render_path, config.output.join("tmap.html"));
        assert!(summary.render_path.exists());
    }

    #[test]
    fn test_placeholder_values_are_seeded_fractions() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "id,smiles\na,CCO\nb,CCN\nc,CCC\n");
        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();
        let first = fs::read_to_string(&summary.data_path).unwrap();
        for line in first.lines().skip(1) {
            let value: f64 = line.rsplit(',').next().unwrap().parse().unwrap();
            assert!((0.0..1.0).contains(&value));
        }

        draw_tmap(&config, &Toolbox::builtin()).unwrap();
        assert_eq!(fs::read_to_string(&summary.data_path).unwrap(), first);
    }

    #[test]
    fn test_non_numeric_features_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), "id,smiles\n1,CCO\n2,CCN\n3,c1ccccc1\n");
        let features = dir.path().join("features.csv");
        fs::write(&features, "id,logp,vendor\n1,-0.31,acme\n3,2.13,globex\n").unwrap();
        config.features = Some(features);

        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();
        let data = fs::read_to_string(&summary.data_path).unwrap();
        assert_eq!(data, "id,smiles,logp\n1,CCO,-0.31\n2,CCN,\n3,c1ccccc1,2.13\n");
    }

    #[test]
    fn test_descriptors_and_static_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), "id,smiles\n1,CCO\n2,c1ccccc1\n3,C1CCCCC1\n4,CC(=O)O\n");
        config.fingerprint = "ECFP4".to_string();
        config.descriptors = vec!["MolWeight".to_string(), "RingCount".to_string()];
        config.render_mode = RenderMode::Static;

        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();
        assert_eq!(summary.render_path, config.output.join("tmap.svg"));
        assert!(summary.render_path.exists());

        let table = CompoundTable::read_csv(&summary.data_path).unwrap();
        assert_eq!(table.columns().len(), 2);
        assert_eq!(
            table.column("RingCount").unwrap().data,
            ColumnData::Integer(vec![Some(0), Some(1), Some(1), Some(0)])
        );
        assert!(table.column("random_value").is_none());

        let layout = Layout::load(&summary.layout_path).unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout.edge_count(), 3);
    }

    #[test]
    fn test_invalid_structures_by_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), "id,smiles\n1,CCO\nbad,C1CC\n3,CCN\nempty,\n");

        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();
        assert_eq!(summary.compounds, 2);
        assert_eq!(summary.skipped, vec!["bad".to_string(), "empty".to_string()]);
        let layout = Layout::load(&summary.layout_path).unwrap();
        assert_eq!(layout.len(), 2);

        config.row_policy = RowPolicy::Strict;
        let error = draw_tmap(&config, &Toolbox::builtin()).unwrap_err();
        assert!(error.is_data_error());
        assert!(matches!(
            error,
            TreemapError::Data(DataError::InvalidSmiles { id, .. }) if id == "bad"
        ));
    }

    #[test]
    fn test_impossible_structures_are_invalid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(
            dir.path(),
            "id,smiles\n1,CCO\npentavalent,C(C)(C)(C)(C)C\n3,CCN\nring,c1cccc1\n",
        );

        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();
        assert_eq!(summary.compounds, 2);
        assert_eq!(summary.skipped, vec!["pentavalent".to_string(), "ring".to_string()]);
        let data = fs::read_to_string(&summary.data_path).unwrap();
        assert!(!data.contains("pentavalent"));

        config.row_policy = RowPolicy::Strict;
        match draw_tmap(&config, &Toolbox::builtin()).unwrap_err() {
            TreemapError::Data(DataError::InvalidSmiles { id, source, .. }) => {
                assert_eq!(id, "pentavalent");
                assert!(matches!(
                    source,
                    GeneratorError::Smiles(crate::SmilesError::Valence { atom: 0, valence: 5 })
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bit_vectors_are_batch_encoded() {
        let bits = vec![vec![1, 0, 1, 0], vec![0, 0, 1, 1]];
        let fingerprints = vec![
            Fingerprint::Bits(bits[0].clone()),
            Fingerprint::MinHash(vec![7, 7, 7, 7]),
            Fingerprint::Bits(bits[1].clone()),
        ];
        let vectors = to_minhash_space(fingerprints, 4, 42).unwrap();

        let encoder = MinHash::new(4, 42);
        assert_eq!(vectors[0], encoder.from_binary_array(&bits[0]));
        assert_eq!(vectors[1], vec![7, 7, 7, 7]);
        assert_eq!(vectors[2], encoder.from_binary_array(&bits[1]));

        assert!(matches!(
            to_minhash_space(vec![Fingerprint::Bits(vec![1, 0])], 4, 42),
            Err(TreemapError::Index(_))
        ));
    }

    #[test]
    fn test_all_invalid_is_an_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "id,smiles\n1,C(\n2,)C\n");
        assert!(matches!(
            draw_tmap(&config, &Toolbox::builtin()),
            Err(TreemapError::Data(DataError::EmptyLibrary))
        ));
    }

    fn failing(_: &str) -> Result<f64, GeneratorError> {
        Err(GeneratorError::Embedding("no conformer".to_string()))
    }

    #[test]
    fn test_descriptor_failures_by_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut toolbox = Toolbox::builtin();
        toolbox.descriptors.register("Broken", failing);
        let mut config = config(dir.path(), "id,smiles\n1,CCO\n2,CCN\n");
        config.descriptors = vec!["Broken".to_string()];

        let summary = draw_tmap(&config, &toolbox).unwrap();
        let data = fs::read_to_string(&summary.data_path).unwrap();
        assert_eq!(data, "id,smiles,Broken\n1,CCO,\n2,CCN,\n");

        config.row_policy = RowPolicy::Strict;
        assert!(matches!(
            draw_tmap(&config, &toolbox),
            Err(TreemapError::Data(DataError::Descriptor { descriptor, .. })) if descriptor == "Broken"
        ));
    }

    #[test]
    fn test_unknown_names_fail_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), "id,smiles\n1,CCO\n");
        config.fingerprint = "MACCS".to_string();
        assert!(matches!(
            draw_tmap(&config, &Toolbox::builtin()),
            Err(TreemapError::Lookup { .. })
        ));
        assert!(!config.output.exists());

        config.fingerprint = "MHFP6".to_string();
        config.descriptors = vec!["logP".to_string()];
        assert!(matches!(
            draw_tmap(&config, &Toolbox::builtin()),
            Err(TreemapError::Lookup { .. })
        ));
    }

    #[test]
    fn test_single_compound() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "id,smiles\nonly,c1ccccc1\n");
        let summary = draw_tmap(&config, &Toolbox::builtin()).unwrap();
        let layout = Layout::load(&summary.layout_path).unwrap();
        assert_eq!(layout.x, vec![0.0]);
        assert_eq!(layout.edge_count(), 0);
    }
}
