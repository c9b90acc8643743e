use std::error::Error;
use std::ffi::OsStr;
use std::process::Command;

fn git_command_stdout<I: IntoIterator<Item = S>, S: AsRef<OsStr>>(args: I) -> Result<String, Box<dyn Error>> {
    Ok(
        String::from_utf8_lossy(Command::new("git").args(args).output()?.stdout.as_slice())
            .trim_end_matches('\n')
            .replace('\n', ";"),
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    // Build information baked into the runner binary, git may be unavailable
    let last_commit = git_command_stdout(&["show", "-s", "--format=Commit: %H%nAuthor: %an, %aI%nTitle: '%s'"]).ok();
    let hostname = hostname::get()?.to_string_lossy().into_owned();
    let timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);

    println!("cargo:rustc-env=ODE_RUNNER_BUILD_TIMESTAMP={}", timestamp);
    println!("cargo:rustc-env=ODE_RUNNER_BUILD_HOSTNAME={}", hostname);
    if let Some(last_commit) = last_commit.filter(|commit| !commit.is_empty()) {
        println!("cargo:rustc-env=ODE_RUNNER_GIT_LAST_COMMIT={}", last_commit);
    }

    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
