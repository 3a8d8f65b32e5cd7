//! Compare whole-file reads through the ring against `std::fs::read`.

use std::borrow::Cow;
use std::path::PathBuf;

use bencher::{run_tests_console, Bencher, TestDesc, TestDescAndFn, TestFn, TestOpts};
use uringfile::Backend;

const SIZES: [usize; 4] = [1 << 10, 64 << 10, 1 << 20, 10 << 20];

#[derive(Clone, Copy)]
enum Reader {
    Std,
    Uring,
    Blocking,
}

impl Reader {
    fn name(self) -> &'static str {
        match self {
            Reader::Std => "std",
            Reader::Uring => "uringfile",
            Reader::Blocking => "uringfile_blocking",
        }
    }
}

struct ReadFileBench {
    reader: Reader,
    path: PathBuf,
    size: usize,
}

impl ReadFileBench {
    fn new(reader: Reader, size: usize) -> Self {
        let path = std::env::temp_dir().join(format!(
            "uringfile-bench-{}-{}-{}",
            std::process::id(),
            reader.name(),
            size
        ));
        let data: Vec<u8> = (0..size).map(|i| (i * 7 + i / 251) as u8).collect();
        std::fs::write(&path, data).unwrap();
        Self { reader, path, size }
    }
}

impl Drop for ReadFileBench {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl bencher::TDynBenchFn for ReadFileBench {
    fn run(&self, b: &mut Bencher) {
        b.bytes = self.size as u64;
        match self.reader {
            Reader::Std => b.iter(|| std::fs::read(&self.path).unwrap()),
            Reader::Uring => b.iter(|| uringfile::read_file(&self.path).unwrap()),
            Reader::Blocking => {
                b.iter(|| uringfile::read_file_with(&Backend::Blocking, &self.path).unwrap())
            }
        }
    }
}

pub fn benches() -> ::std::vec::Vec<TestDescAndFn> {
    let mut benches = vec![];
    for size in SIZES {
        for reader in [Reader::Std, Reader::Uring, Reader::Blocking] {
            benches.push(TestDescAndFn {
                desc: TestDesc {
                    name: Cow::from(format!("read_file/{}/size={}", reader.name(), size)),
                    ignore: false,
                },
                testfn: TestFn::DynBenchFn(Box::new(ReadFileBench::new(reader, size))),
            })
        }
    }
    benches
}

fn main() {
    let mut test_opts = TestOpts::default();
    if let Some(arg) = ::std::env::args().skip(1).find(|arg| *arg != "--bench") {
        test_opts.filter = Some(arg);
    }
    let mut all = Vec::new();
    all.extend(benches());
    run_tests_console(&test_opts, all).unwrap();
}
