// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use anyhow::Result;
use indoc::indoc;
use patchy::{
    apply::{apply, ApplyOptions, ErrorCategory},
    config::AutoCommitMode,
    git::{GitClient, LazyGit2Client},
    prompt::{Confirmation, ScriptedConfirm},
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{env::current_dir, path::PathBuf};

#[sealed_test]
fn apply_new_files_from_every_patch_set_in_order() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.write_patch("003-third", "third.txt", "third\n")?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;
    fixture.write_patch("002-second", "nested/second.txt", "second\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let summary = apply(&fixture.options(), &git, &mut confirm)?;

    assert_eq!(
        summary.to_string(),
        "Successfully applied 3 patch file(s) across 3 patch set(s)."
    );
    assert_eq!(fixture.read("first.txt")?, "first\n");
    assert_eq!(fixture.read("nested/second.txt")?, "second\n");
    assert_eq!(fixture.read("third.txt")?, "third\n");
    assert_eq!(
        fixture.history()?,
        vec![
            "Apply patch set: 003-third".to_string(),
            "Apply patch set: 002-second".to_string(),
            "Apply patch set: 001-first".to_string(),
        ]
    );
    assert!(git.status()?.is_empty());

    Ok(())
}

const DRIFTED_DIFF: &str = indoc! {"
    --- a/src/config.js
    +++ b/src/config.js
    @@ -1,3 +1,3 @@
    -const value = 1;
    +const value = 42;
     const other = 2;
     const removed = 3;
"};

#[sealed_test]
fn fuzzy_diff_tolerates_missing_context() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("src/config.js", "const value = 1;\nconst other = 2;\n")?;
    fixture.write_patch("001-answer", "src/config.js.diff", DRIFTED_DIFF)?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let summary = apply(&fixture.options(), &git, &mut confirm)?;

    assert!(!summary.has_errors());
    assert_eq!(
        fixture.read("src/config.js")?,
        "const value = 42;\nconst other = 2;\n"
    );

    Ok(())
}

#[sealed_test]
fn exact_diff_rejects_missing_context() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("src/config.js", "const value = 1;\nconst other = 2;\n")?;
    fixture.write_patch("001-answer", "src/config.js.diff", DRIFTED_DIFF)?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let options = ApplyOptions {
        fuzz_factor: 0,
        ..fixture.options()
    };
    let summary = apply(&options, &git, &mut confirm)?;

    assert!(summary.has_errors());
    assert!(summary.to_string().contains("Patch failed to apply"));
    assert_eq!(
        fixture.read("src/config.js")?,
        "const value = 1;\nconst other = 2;\n"
    );
    assert_eq!(fixture.history()?.len(), 1);

    Ok(())
}

#[sealed_test]
fn diff_against_missing_target_is_reported() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("README.md", "upstream\n")?;
    fixture.write_patch("001-broken", "missing.txt.diff", "@@ -1 +1 @@\n-a\n+b\n")?;
    fixture.write_patch("001-broken", "extra.txt", "still copied\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let summary = apply(&fixture.options(), &git, &mut confirm)?;

    assert!(summary.has_errors());
    assert_eq!(
        summary.to_string(),
        "Errors occurred while applying patches:\n  \
         001-broken/missing.txt.diff: Target file does not exist: missing.txt"
    );
    assert_eq!(fixture.read("extra.txt")?, "still copied\n");
    assert_eq!(git.status()?, vec![PathBuf::from("extra.txt")]);

    Ok(())
}

#[sealed_test]
fn failed_patch_set_stays_out_of_later_commits() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("README.md", "upstream\n")?;
    fixture.write_patch("001-broken", "from-broken.txt", "broken\n")?;
    fixture.write_patch("001-broken", "missing.txt.diff", "@@ -1 +1 @@\n-a\n+b\n")?;
    fixture.write_patch("002-good", "good.txt", "good\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let options = ApplyOptions {
        all: true,
        ..fixture.options()
    };
    let summary = apply(&options, &git, &mut confirm)?;

    assert!(summary.has_errors());
    assert_eq!(fixture.history()?[0], "Apply patch set: 002-good");
    assert_eq!(git.status()?, vec![PathBuf::from("from-broken.txt")]);

    let repository = git2::Repository::open(fixture.target_repo())?;
    let tree = repository.head()?.peel_to_tree()?;
    assert!(tree.get_name("good.txt").is_some());
    assert!(tree.get_name("from-broken.txt").is_none());

    Ok(())
}

#[sealed_test]
fn reject_bad_patch_set_selection() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;
    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();

    let cases = [
        (Some("missing-set"), None, "Patch set not found: missing-set"),
        (
            Some("a"),
            Some("b"),
            "Cannot use both --only and --until flags together",
        ),
    ];
    for (only, until, expect) in cases {
        let options = ApplyOptions {
            only: only.map(String::from),
            until: until.map(String::from),
            ..fixture.options()
        };
        let error = apply(&options, &git, &mut confirm).unwrap_err();
        assert_eq!(error.to_string(), expect);
        assert_eq!(error.category(), ErrorCategory::Usage);
    }
    assert!(fixture.history()?.is_empty());

    Ok(())
}

#[sealed_test]
fn declining_last_patch_set_leaves_it_uncommitted() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("README.md", "upstream\n")?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;
    fixture.write_patch("002-second", "second.txt", "second\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::new([Confirmation::No]);
    let summary = apply(&fixture.options(), &git, &mut confirm)?;

    assert!(!summary.has_errors());
    assert_eq!(fixture.history()?[0], "Apply patch set: 001-first");
    assert_eq!(git.status()?, vec![PathBuf::from("second.txt")]);
    assert_eq!(
        confirm.asked(),
        ["Commit changes from patch set \"002-second\"?".to_string()]
    );

    Ok(())
}

#[sealed_test]
fn until_makes_selected_patch_set_the_last_one() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("README.md", "upstream\n")?;
    for name in ["001-first", "002-second", "003-third"] {
        fixture.write_patch(name, format!("{name}.txt"), "blah\n")?;
    }

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let options = ApplyOptions {
        until: Some("002-second".into()),
        edit: true,
        ..fixture.options()
    };
    let summary = apply(&options, &git, &mut confirm)?;

    assert_eq!(summary.patch_sets.len(), 2);
    assert_eq!(fixture.history()?[0], "Apply patch set: 001-first");
    assert_eq!(git.status()?, vec![PathBuf::from("002-second.txt")]);
    assert!(!fixture.target_repo().join("003-third.txt").exists());

    Ok(())
}

#[sealed_test]
fn dry_run_changes_nothing() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("src/config.js", "const value = 1;\nconst other = 2;\n")?;
    fixture.write_patch("001-answer", "src/config.js.diff", DRIFTED_DIFF)?;
    fixture.write_patch("001-answer", "new.txt", "new\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let options = ApplyOptions {
        dry_run: true,
        ..fixture.options()
    };
    let summary = apply(&options, &git, &mut confirm)?;

    assert_eq!(
        summary.to_string(),
        "Would apply 2 patch file(s) across 1 patch set(s)."
    );
    assert!(git.status()?.is_empty());
    assert_eq!(fixture.history()?.len(), 1);

    Ok(())
}

#[sealed_test]
fn refuse_dirty_working_tree() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.commit_file("README.md", "upstream\n")?;
    std::fs::write(fixture.target_repo().join("README.md"), "local edit\n")?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let error = apply(&fixture.options(), &git, &mut confirm).unwrap_err();

    assert_eq!(error.category(), ErrorCategory::Precondition);
    assert!(!fixture.target_repo().join("first.txt").exists());

    Ok(())
}

#[sealed_test]
fn no_patch_sets_is_not_an_error() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();

    let summary = apply(&fixture.options(), &git, &mut confirm)?;
    assert_eq!(summary.to_string(), "No patch sets found.");

    Ok(())
}

#[sealed_test]
fn no_patch_sets_needs_no_repository() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    let plain_dir = current_dir()?.join("plain");
    std::fs::create_dir(&plain_dir)?;

    let git = LazyGit2Client::new(&plain_dir);
    let mut confirm = ScriptedConfirm::detached();
    let options = ApplyOptions {
        target_repo: plain_dir,
        ..fixture.options()
    };
    let summary = apply(&options, &git, &mut confirm)?;
    assert_eq!(summary.to_string(), "No patch sets found.");

    fixture.write_patch("001-first", "first.txt", "first\n")?;
    let error = apply(&options, &git, &mut confirm).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Commit);

    Ok(())
}

#[sealed_test]
fn commit_every_patch_set_with_all() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;
    fixture.write_patch("002-second", "second.txt", "second\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::new(Vec::<Confirmation>::new());
    let options = ApplyOptions {
        auto_commit: AutoCommitMode::Off,
        all: true,
        ..fixture.options()
    };
    apply(&options, &git, &mut confirm)?;

    assert_eq!(fixture.history()?.len(), 2);
    assert!(confirm.asked().is_empty());

    Ok(())
}

#[cfg(unix)]
#[sealed_test]
fn hooks_surround_patch_set() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;
    fixture.write_hook(
        "001-first",
        "patchy-pre-apply",
        "#!/bin/sh\nprintf '%s %s\\n' \"$PATCHY_HOOK_TYPE\" \"$PATCHY_PATCH_SET\" > hooks.log\n",
    )?;
    fixture.write_hook(
        "001-first",
        "patchy-post-apply",
        "#!/bin/sh\ntest -f first.txt && printf '%s\\n' \"$PATCHY_HOOK_TYPE\" >> hooks.log\n",
    )?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let summary = apply(&fixture.options(), &git, &mut confirm)?;

    assert_eq!(summary.total_files(), 1);
    assert_eq!(fixture.read("hooks.log")?, "pre-apply 001-first\npost-apply\n");
    assert!(!fixture.target_repo().join("patchy-pre-apply").exists());
    assert!(git.status()?.is_empty());

    Ok(())
}

#[cfg(unix)]
#[sealed_test]
fn failing_hook_aborts_run() -> Result<()> {
    let fixture = RepoFixture::new(current_dir()?)?;
    fixture.write_patch("001-first", "first.txt", "first\n")?;
    fixture.write_hook("001-first", "patchy-pre-apply", "#!/bin/sh\necho broken >&2\nexit 3\n")?;
    fixture.write_patch("002-second", "second.txt", "second\n")?;

    let git = fixture.client()?;
    let mut confirm = ScriptedConfirm::detached();
    let error = apply(&fixture.options(), &git, &mut confirm).unwrap_err();

    assert_eq!(error.category(), ErrorCategory::HookExecution);
    assert_eq!(error.to_string(), "hook patchy-pre-apply exited with code 3");
    assert!(!fixture.target_repo().join("first.txt").exists());
    assert!(!fixture.target_repo().join("second.txt").exists());

    Ok(())
}
