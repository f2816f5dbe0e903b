use vfs_pathlib::{FakePathlib, FsBackend, MapFS, TextOptions};

fn main() {
    // an empty POSIX store with only `/`; nothing touches the host disk
    let pathlib = FakePathlib::from_backend(MapFS::new());

    // creates `/docs` and `/docs/drafts` in one go
    let drafts = pathlib.path(["/docs/drafts"]);
    drafts.mkdir(0o755, true, false).unwrap();

    // change the store's CWD to `/docs`
    pathlib.fs().borrow_mut().cd("/docs").unwrap();

    // `first.txt` is relative, so it lands in the CWD
    let first = pathlib.path(["first.txt"]);
    first.write_text("Hello", TextOptions::new()).unwrap();
    assert!(pathlib.path(["/docs/first.txt"]).exists().unwrap());

    // `/second.txt` is absolute and lands in the root
    let second = pathlib.path(["/second.txt"]);
    second.write_bytes(b"World").unwrap();

    // a symlink to the first file, resolved back to its real location
    let link = &drafts / "latest";
    link.symlink_to("/docs/first.txt").unwrap();
    assert_eq!(link.resolve(true).unwrap().to_string(), "/docs/first.txt");

    println!(
        "{}, {}!",
        link.read_text(TextOptions::new()).unwrap(),
        second.read_text(TextOptions::new()).unwrap()
    );

    for entry in pathlib.path(["/docs"]).iterdir().unwrap() {
        println!("{entry} (dir: {})", entry.is_dir().unwrap());
    }

    // removes everything again
    link.unlink(false).unwrap();
    first.unlink(false).unwrap();
    second.unlink(false).unwrap();
    drafts.rmdir().unwrap();
}
