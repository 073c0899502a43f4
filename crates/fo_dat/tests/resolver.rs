mod common;

use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use common::{Codec, Dat2Builder};
use fo_dat::{
    error::{Error, FileNotFoundError},
    PathKind, ResolverOptions, SourceResolver,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tracing_test::traced_test;

fn write_archive(dir: &Path, name: &str, builder: Dat2Builder) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, builder.build()).unwrap();
    path
}

fn write_loose(dir: &Path, name: &str, contents: &[u8]) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read_asset(resolver: &mut SourceResolver, path: &str) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    resolver.open(path)?.read_to_end(&mut buffer)?;
    Ok(buffer)
}

struct Fixture {
    root: TempDir,
    loose: PathBuf,
    archives: Vec<PathBuf>,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let loose = root.path().join("data");
    fs::create_dir(&loose).unwrap();

    let a = write_archive(
        root.path(),
        "a.dat",
        Dat2Builder::new().file("text\\english\\game\\misc.msg", Codec::Zlib, b"from a"),
    );
    let b = write_archive(
        root.path(),
        "b.dat",
        Dat2Builder::new()
            .file("text\\english\\game\\misc.msg", Codec::Stored, b"from b")
            .file("art\\items\\knife.frm", Codec::Lzss, b"knife knife knife"),
    );
    let c = write_archive(
        root.path(),
        "c.dat",
        Dat2Builder::new()
            .file("art\\items\\knife.frm", Codec::Stored, b"shadowed")
            .file("maps\\arroyo.map", Codec::Stored, b"arroyo"),
    );

    Fixture {
        root,
        loose,
        archives: vec![a, b, c],
    }
}

fn resolver(fixture: &Fixture) -> Result<SourceResolver, Error> {
    SourceResolver::new(
        ResolverOptions::builder()
            .loose_dirs(vec![fixture.loose.clone()])
            .archives(fixture.archives.clone())
            .build(),
    )
}

#[traced_test]
#[test]
fn first_archive_holding_the_path_wins() -> Result<(), Error> {
    let fixture = fixture();
    let mut resolver = resolver(&fixture)?;

    assert_eq!(read_asset(&mut resolver, "text/english/game/misc.msg")?, b"from a");
    assert_eq!(read_asset(&mut resolver, "ART\\ITEMS\\KNIFE.FRM")?, b"knife knife knife");
    assert_eq!(read_asset(&mut resolver, "maps/arroyo.map")?, b"arroyo");

    let asset = resolver.open("maps/arroyo.map")?;
    assert!(!asset.is_loose());
    assert_eq!(asset.size(), 6);

    Ok(())
}

#[traced_test]
#[test]
fn loose_files_override_archives() -> Result<(), Error> {
    let fixture = fixture();
    write_loose(&fixture.loose, "art/items/knife.frm", b"on disk");
    let mut resolver = resolver(&fixture)?;

    let mut asset = resolver.open("art\\items\\knife.frm")?;
    assert!(asset.is_loose());
    assert_eq!(asset.size(), 7);

    let mut buffer = Vec::new();
    asset.seek(SeekFrom::Start(3))?;
    asset.read_to_end(&mut buffer)?;
    assert_eq!(buffer, b"disk");
    assert!(asset.eof());
    asset.close();

    assert_eq!(resolver.file_size("art/items/knife.frm"), Some(7));
    assert_eq!(resolver.read_file("ART/ITEMS/KNIFE.FRM")?, b"on disk");

    Ok(())
}

#[traced_test]
#[test]
fn earlier_loose_directories_win() -> Result<(), Error> {
    let fixture = fixture();
    let patch = fixture.root.path().join("patch");
    write_loose(&patch, "maps/arroyo.map", b"patched");
    write_loose(&fixture.loose, "maps/arroyo.map", b"loose");

    let mut resolver = SourceResolver::new(
        ResolverOptions::builder()
            .loose_dirs(vec![patch])
            .archives(fixture.archives.clone())
            .build(),
    )?;
    resolver.add_loose_dir(fixture.loose.clone());

    assert_eq!(read_asset(&mut resolver, "maps/arroyo.map")?, b"patched");

    Ok(())
}

#[traced_test]
#[test]
fn unopenable_loose_copy_falls_through_to_archives() -> Result<(), Error> {
    let fixture = fixture();
    // a file where the loose `maps` directory belongs makes the open fail with something other
    // than NotFound
    fs::write(fixture.loose.join("maps"), b"not a directory").unwrap();
    let mut resolver = resolver(&fixture)?;

    let asset = resolver.open("maps/arroyo.map")?;
    assert!(!asset.is_loose());
    assert_eq!(read_asset(&mut resolver, "maps/arroyo.map")?, b"arroyo");
    assert_eq!(resolver.file_size("maps/arroyo.map"), Some(6));
    assert_eq!(resolver.read_file("maps/arroyo.map")?, b"arroyo");
    assert!(logs_contain("unable to open loose file"));

    Ok(())
}

#[traced_test]
#[test]
fn loose_directory_with_the_asset_name_is_skipped() -> Result<(), Error> {
    let fixture = fixture();
    fs::create_dir_all(fixture.loose.join("maps/arroyo.map")).unwrap();
    let mut resolver = resolver(&fixture)?;

    assert_eq!(read_asset(&mut resolver, "maps/arroyo.map")?, b"arroyo");
    assert_eq!(resolver.file_size("maps/arroyo.map"), Some(6));

    Ok(())
}

#[traced_test]
#[test]
fn missing_path_lists_every_source() -> Result<(), Error> {
    let fixture = fixture();
    let mut resolver = resolver(&fixture)?;

    let expected: Vec<String> = [&fixture.loose]
        .into_iter()
        .chain(&fixture.archives)
        .map(|path| path.display().to_string())
        .collect();
    assert_eq!(resolver.sources(), expected);

    let err = resolver.open("art/items/missing.frm").unwrap_err();
    assert!(err.is_not_found());
    let Error::FileNotFound(FileNotFoundError::Sources { name, searched }) = &err else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(name, "art/items/missing.frm");
    assert_eq!(searched, &expected);

    // the sources were tried in the order they are listed
    assert!(logs_contain("not in loose directory"));
    assert!(logs_contain("not in archive"));
    logs_assert(|lines: &[&str]| {
        let tried: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|line| line.contains("missing.frm") && line.contains("not in"))
            .collect();
        let mut last = None;
        for source in &expected {
            let Some(at) = tried.iter().position(|line| line.contains(source.as_str())) else {
                return Err(format!("{source} was never tried"));
            };
            if last.is_some_and(|last| at <= last) {
                return Err(format!("{source} was tried out of order"));
            }
            last = Some(at);
        }
        Ok(())
    });

    assert!(resolver.read_file("missing").unwrap_err().is_not_found());
    assert_eq!(resolver.file_size("missing"), None);

    Ok(())
}

#[traced_test]
#[test]
fn open_by_kind() -> Result<(), Error> {
    let fixture = fixture();
    let mut resolver = resolver(&fixture)?;

    let mut buffer = Vec::new();
    resolver
        .open_kind(PathKind::TextEnglishGame, "MISC.MSG")?
        .read_to_end(&mut buffer)?;
    assert_eq!(buffer, b"from a");

    assert_eq!(resolver.file_size(&PathKind::Maps.join("arroyo.map")), Some(6));

    Ok(())
}

#[traced_test]
#[test]
fn list_files_merges_sources() -> Result<(), Error> {
    let fixture = fixture();
    write_loose(&fixture.loose, "art/items/rock.frm", b"rock");
    write_loose(&fixture.loose, "art/items/Knife.FRM", b"loose knife");
    write_loose(&fixture.loose, "art/items/readme.txt", b"notes");
    let resolver = resolver(&fixture)?;

    let mut names = resolver.list_files("art\\items", false, "frm");
    names.sort();
    assert_eq!(names, vec!["art/items/Knife.FRM", "art/items/rock.frm"]);

    let everything = resolver.list_files("", true, "");
    assert_eq!(everything.len(), 5);
    assert!(everything.contains(&"maps/arroyo.map".to_owned()));

    Ok(())
}

#[traced_test]
#[test]
fn unreadable_archive_fails_construction() {
    let fixture = fixture();
    let broken = fixture.root.path().join("broken.dat");
    fs::write(&broken, [0u8; 3]).unwrap();

    let err = SourceResolver::new(
        ResolverOptions::builder()
            .archives(vec![fixture.archives[0].clone(), broken])
            .build(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Truncated), "{err:?}");

    let mut resolver = SourceResolver::new(ResolverOptions::default()).unwrap();
    let err = resolver
        .mount(fixture.root.path().join("missing.dat"))
        .unwrap_err();
    assert!(matches!(err, Error::OpenFailed { .. }), "{err:?}");
    assert!(resolver.sources().is_empty());
}
