use std::collections::HashSet;
use std::fs;

use like_xception::config::DataConfig;
use like_xception::dataset::partition::{make_partitions, source_file_name, PartitionOutcome};
use like_xception::dataset::{ImageFolder, Split};

fn write_source(dir: &std::path::Path, per_class: usize) {
    fs::create_dir_all(dir).unwrap();
    for category in ["cat", "dog"] {
        for i in 0..per_class {
            fs::write(dir.join(source_file_name(category, i)), b"jpg").unwrap();
        }
    }
}

#[test]
fn default_ranges_give_1000_500_1000_per_class() {
    let temp = tempfile::tempdir().unwrap();
    let config = DataConfig {
        source_dir: temp.path().join("extracted_files").join("train"),
        base_dir: temp.path().join("cats_vs_dogs_small"),
        ..DataConfig::default()
    };
    // One extra file per class that no split may pick up
    write_source(&config.source_dir, 2501);

    let PartitionOutcome::Created(stats) = make_partitions(&config).unwrap() else {
        panic!("partition should be created on first run");
    };

    let expected = [(Split::Train, 1000), (Split::Validation, 500), (Split::Test, 1000)];
    let mut names = HashSet::new();
    for (split, count) in expected {
        let folder = ImageFolder::new(config.split_dir(split.dir_name())).unwrap();
        assert_eq!(folder.class_names, vec!["cat", "dog"]);
        assert_eq!(folder.class_counts(), vec![count, count]);
        assert_eq!(stats.count(split, "cat"), count);

        for sample in &folder.samples {
            let name = sample.path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with(&sample.class_name));
            assert!(names.insert(name), "file name appears in two splits");
        }
    }
    assert_eq!(names.len(), 5000);
    assert!(!names.contains("cat.2500.jpg"));

    assert_eq!(make_partitions(&config).unwrap(), PartitionOutcome::Skipped);
}
