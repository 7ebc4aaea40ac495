//! Turning git failure text into typed reasons.
//!
//! Every operation owns an ordered table of `(pattern, reason)` rules. The
//! first rule whose pattern matches the failure's message, stderr or stdout
//! wins, so more specific patterns sit above the generic ones they overlap
//! with. Matching is case-insensitive.

use super::error::GitFailure;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

macro_rules! reasons {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

reasons!(
    /// Why `git push` failed.
    PushReason {
        NoUpstream => "no-upstream",
        RejectedWithLease => "rejected-with-lease",
        RemoteAhead => "remote-ahead",
        TipBehind => "tip-behind",
        PermissionDenied => "permission-denied",
        RemoteConnection => "remote-connection-failed",
        Rejected => "rejected",
    }
);

reasons!(
    /// Why `git pull` failed.
    PullReason {
        Conflict => "conflict",
        GitIdentity => "git-identity",
        RemoteConnection => "remote-connection-failed",
        UnstagedChanges => "unstaged-changes",
        UnmergedFiles => "unmerged-files",
        UncommittedChanges => "uncommitted-changes",
        OverwrittenChanges => "overwritten-changes",
        RefLocked => "ref-locked",
        RebaseMultipleBranches => "rebase-multiple-branches",
        TagConflict => "tag-conflict",
        DivergentBranches => "divergent-branches",
        NoUpstream => "no-upstream",
    }
);

reasons!(
    /// Why `git fetch` failed.
    FetchReason {
        NoFastForward => "no-fast-forward",
        NoRemote => "no-remote",
        RemoteConnection => "remote-connection-failed",
    }
);

reasons!(
    /// Why `git merge` failed.
    MergeReason {
        InProgress => "in-progress",
        UnmergedFiles => "unmerged-files",
        WouldOverwrite => "would-overwrite",
        UncommittedChanges => "uncommitted-changes",
        UnrelatedHistories => "unrelated-histories",
        InvalidRef => "invalid-ref",
        Conflict => "conflict",
    }
);

reasons!(
    /// Why `git rebase` failed.
    RebaseReason {
        InProgress => "in-progress",
        UncommittedChanges => "uncommitted-changes",
        WouldOverwrite => "would-overwrite",
        Conflict => "conflict",
    }
);

reasons!(
    /// Why `git cherry-pick` failed.
    CherryPickReason {
        InProgress => "in-progress",
        WouldOverwrite => "would-overwrite",
        EmptyCommit => "empty-commit",
        Conflict => "conflict",
    }
);

reasons!(
    /// Why `git revert` failed.
    RevertReason {
        InProgress => "in-progress",
        WouldOverwrite => "would-overwrite",
        Conflict => "conflict",
    }
);

reasons!(
    /// Why `git checkout` / `git switch` failed.
    CheckoutReason {
        WouldOverwrite => "would-overwrite",
        UnmergedFiles => "unmerged-files",
        AlreadyCheckedOut => "already-checked-out",
        InvalidRef => "invalid-ref",
    }
);

reasons!(
    /// Why `git reset` failed.
    ResetReason {
        AmbiguousArgument => "ambiguous-argument",
        WouldOverwrite => "would-overwrite",
        UnmergedChanges => "unmerged-changes",
        EntryNotUpToDate => "entry-not-up-to-date",
        RefLocked => "ref-locked",
        PermissionDenied => "permission-denied",
    }
);

reasons!(
    /// Why `git stash apply` / `pop` failed.
    StashApplyReason {
        NoStash => "no-stash",
        WouldOverwrite => "would-overwrite",
        Conflict => "conflict",
    }
);

reasons!(
    /// Why `git stash push` failed.
    StashPushReason {
        ConflictingStagedAndUnstagedLines => "conflicting-staged-and-unstaged-lines",
        UnmergedFiles => "unmerged-files",
        NothingToSave => "nothing-to-save",
    }
);

reasons!(
    /// Why a branch create/rename/delete failed.
    BranchReason {
        CheckedOutElsewhere => "checked-out-elsewhere",
        NotFullyMerged => "not-fully-merged",
        InvalidName => "invalid-name",
        AlreadyExists => "already-exists",
        DoesNotExist => "does-not-exist",
        RemoteConnection => "remote-connection-failed",
    }
);

reasons!(
    /// Why a tag create/delete/push failed.
    TagReason {
        AlreadyExists => "already-exists",
        NotFound => "not-found",
        InvalidName => "invalid-name",
        PermissionDenied => "permission-denied",
        RemoteRejected => "remote-rejected",
        RemoteConnection => "remote-connection-failed",
    }
);

reasons!(
    /// Why a worktree operation failed.
    WorktreeReason {
        AlreadyCheckedOut => "already-checked-out",
        DirectoryNotEmpty => "directory-not-empty",
        Locked => "locked",
        HasChanges => "has-changes",
        NotAWorktree => "not-a-worktree",
        AlreadyExists => "already-exists",
    }
);

reasons!(
    /// Advisory conditions that read-only probes may treat as "nothing here".
    GitWarning {
        NotARepository => "not-a-repository",
        OutsideRepository => "outside-repository",
        NoSuchPath => "no-such-path",
        NoCommits => "no-commits",
        PathNotInRevision => "path-not-in-revision",
        PathNotInIndex => "path-not-in-index",
        DetachedHead => "detached-head",
        NoUpstream => "no-upstream",
        UnknownRevision => "unknown-revision",
        NotAWorkTree => "not-a-work-tree",
    }
);

/// Operations with a classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitOperation {
    Push,
    Pull,
    Fetch,
    Merge,
    Rebase,
    CherryPick,
    Revert,
    Checkout,
    Reset,
    StashApply,
    StashPush,
    Branch,
    Tag,
    Worktree,
}

impl GitOperation {
    pub const ALL: [GitOperation; 14] = [
        GitOperation::Push,
        GitOperation::Pull,
        GitOperation::Fetch,
        GitOperation::Merge,
        GitOperation::Rebase,
        GitOperation::CherryPick,
        GitOperation::Revert,
        GitOperation::Checkout,
        GitOperation::Reset,
        GitOperation::StashApply,
        GitOperation::StashPush,
        GitOperation::Branch,
        GitOperation::Tag,
        GitOperation::Worktree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GitOperation::Push => "push",
            GitOperation::Pull => "pull",
            GitOperation::Fetch => "fetch",
            GitOperation::Merge => "merge",
            GitOperation::Rebase => "rebase",
            GitOperation::CherryPick => "cherry-pick",
            GitOperation::Revert => "revert",
            GitOperation::Checkout => "checkout",
            GitOperation::Reset => "reset",
            GitOperation::StashApply => "stash-apply",
            GitOperation::StashPush => "stash-push",
            GitOperation::Branch => "branch",
            GitOperation::Tag => "tag",
            GitOperation::Worktree => "worktree",
        }
    }
}

impl fmt::Display for GitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GitOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        GitOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| format!("unknown git operation: {s}"))
    }
}

/// A typed reason for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "operation", content = "reason", rename_all = "kebab-case")]
pub enum Reason {
    Push(PushReason),
    Pull(PullReason),
    Fetch(FetchReason),
    Merge(MergeReason),
    Rebase(RebaseReason),
    CherryPick(CherryPickReason),
    Revert(RevertReason),
    Checkout(CheckoutReason),
    Reset(ResetReason),
    StashApply(StashApplyReason),
    StashPush(StashPushReason),
    Branch(BranchReason),
    Tag(TagReason),
    Worktree(WorktreeReason),
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Push(r) => r.as_str(),
            Reason::Pull(r) => r.as_str(),
            Reason::Fetch(r) => r.as_str(),
            Reason::Merge(r) => r.as_str(),
            Reason::Rebase(r) => r.as_str(),
            Reason::CherryPick(r) => r.as_str(),
            Reason::Revert(r) => r.as_str(),
            Reason::Checkout(r) => r.as_str(),
            Reason::Reset(r) => r.as_str(),
            Reason::StashApply(r) => r.as_str(),
            Reason::StashPush(r) => r.as_str(),
            Reason::Branch(r) => r.as_str(),
            Reason::Tag(r) => r.as_str(),
            Reason::Worktree(r) => r.as_str(),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one failure. The failure is kept untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub operation: GitOperation,
    /// `None` when no rule matched.
    pub reason: Option<Reason>,
    pub failure: GitFailure,
}

impl Classification {
    pub fn is_classified(&self) -> bool {
        self.reason.is_some()
    }

    /// The reason's name, or `"other"`.
    pub fn label(&self) -> &'static str {
        self.reason.as_ref().map_or("other", Reason::as_str)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.operation, self.label(), self.failure)
    }
}

struct Rule<R> {
    pattern: Regex,
    reason: R,
}

fn rules<R: Copy>(table: &[(&str, R)]) -> Vec<Rule<R>> {
    table
        .iter()
        .map(|(pattern, reason)| Rule {
            pattern: Regex::new(&format!("(?i){pattern}")).expect("constant regex pattern is valid"),
            reason: *reason,
        })
        .collect()
}

fn first_match<R: Copy>(rules: &[Rule<R>], failure: &GitFailure) -> Option<R> {
    let texts = failure.texts();
    rules
        .iter()
        .find(|rule| texts.iter().any(|text| rule.pattern.is_match(text)))
        .map(|rule| rule.reason)
}

const REMOTE_CONNECTION: &str =
    r"could not read from remote repository|unable to access '|could not resolve host|connection (?:refused|timed out)";
const WOULD_OVERWRITE: &str = r"would be overwritten by|local changes to the following files would be overwritten";
const CONFLICT: &str = r"CONFLICT \(|Automatic merge failed|Merge conflict in";

static PUSH_RULES: LazyLock<Vec<Rule<PushReason>>> = LazyLock::new(|| {
    rules(&[
        (r"has no upstream branch", PushReason::NoUpstream),
        (r"\(stale info\)", PushReason::RejectedWithLease),
        (r"rejected because the remote contains work", PushReason::RemoteAhead),
        (r"tip of your current branch is behind", PushReason::TipBehind),
        (r"permission(?: to \S+)? denied|error: 403|access denied", PushReason::PermissionDenied),
        (REMOTE_CONNECTION, PushReason::RemoteConnection),
        (
            r"! \[(?:remote )?rejected\]|non-fast-forward|failed to push some refs",
            PushReason::Rejected,
        ),
    ])
});

static PULL_RULES: LazyLock<Vec<Rule<PullReason>>> = LazyLock::new(|| {
    rules(&[
        (r"please tell me who you are|unable to auto-detect email address", PullReason::GitIdentity),
        (r"cannot pull with rebase: you have unstaged changes", PullReason::UnstagedChanges),
        (r"your index contains uncommitted changes", PullReason::UncommittedChanges),
        (
            r"pulling is not possible because you have unmerged files|you have not concluded your merge",
            PullReason::UnmergedFiles,
        ),
        (WOULD_OVERWRITE, PullReason::OverwrittenChanges),
        (r"cannot lock ref|unable to update local ref", PullReason::RefLocked),
        (r"cannot rebase onto multiple branches", PullReason::RebaseMultipleBranches),
        (r"would clobber existing tag", PullReason::TagConflict),
        (
            r"you have divergent branches|how to reconcile divergent branches",
            PullReason::DivergentBranches,
        ),
        (r"there is no tracking information for the current branch", PullReason::NoUpstream),
        (REMOTE_CONNECTION, PullReason::RemoteConnection),
        (CONFLICT, PullReason::Conflict),
    ])
});

static FETCH_RULES: LazyLock<Vec<Rule<FetchReason>>> = LazyLock::new(|| {
    rules(&[
        (r"non-fast-forward|! \[rejected\]", FetchReason::NoFastForward),
        (
            r"no remote repository specified|no such remote|'[^']+' does not appear to be a git repository",
            FetchReason::NoRemote,
        ),
        (REMOTE_CONNECTION, FetchReason::RemoteConnection),
    ])
});

static MERGE_RULES: LazyLock<Vec<Rule<MergeReason>>> = LazyLock::new(|| {
    rules(&[
        (r"you have not concluded your merge|MERGE_HEAD exists", MergeReason::InProgress),
        (
            r"merging is not possible because you have unmerged files|you have unmerged files",
            MergeReason::UnmergedFiles,
        ),
        (WOULD_OVERWRITE, MergeReason::WouldOverwrite),
        (r"please commit your changes or stash them", MergeReason::UncommittedChanges),
        (r"refusing to merge unrelated histories", MergeReason::UnrelatedHistories),
        (r"not something we can merge", MergeReason::InvalidRef),
        (CONFLICT, MergeReason::Conflict),
    ])
});

static REBASE_RULES: LazyLock<Vec<Rule<RebaseReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"already a rebase-(?:merge|apply) directory|rebase in progress",
            RebaseReason::InProgress,
        ),
        (
            r"cannot rebase: you have unstaged changes|your index contains uncommitted changes|please commit or stash them",
            RebaseReason::UncommittedChanges,
        ),
        (WOULD_OVERWRITE, RebaseReason::WouldOverwrite),
        (r"CONFLICT \(|could not apply|resolve all conflicts manually", RebaseReason::Conflict),
    ])
});

static CHERRY_PICK_RULES: LazyLock<Vec<Rule<CherryPickReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"cherry-pick is already in progress|cherry-pick or revert is already in progress",
            CherryPickReason::InProgress,
        ),
        (WOULD_OVERWRITE, CherryPickReason::WouldOverwrite),
        (r"the previous cherry-pick is now empty", CherryPickReason::EmptyCommit),
        (r"CONFLICT \(|could not apply|after resolving the conflicts", CherryPickReason::Conflict),
    ])
});

static REVERT_RULES: LazyLock<Vec<Rule<RevertReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"revert is already in progress|cherry-pick or revert is already in progress",
            RevertReason::InProgress,
        ),
        (WOULD_OVERWRITE, RevertReason::WouldOverwrite),
        (r"CONFLICT \(|could not revert|after resolving the conflicts", RevertReason::Conflict),
    ])
});

static CHECKOUT_RULES: LazyLock<Vec<Rule<CheckoutReason>>> = LazyLock::new(|| {
    rules(&[
        (WOULD_OVERWRITE, CheckoutReason::WouldOverwrite),
        (
            r"you need to resolve your current index first|is unmerged",
            CheckoutReason::UnmergedFiles,
        ),
        (
            r"is already checked out at|is already used by worktree",
            CheckoutReason::AlreadyCheckedOut,
        ),
        (
            r"did not match any file\(s\) known to git|invalid reference",
            CheckoutReason::InvalidRef,
        ),
    ])
});

static RESET_RULES: LazyLock<Vec<Rule<ResetReason>>> = LazyLock::new(|| {
    rules(&[
        (r"ambiguous argument", ResetReason::AmbiguousArgument),
        (WOULD_OVERWRITE, ResetReason::WouldOverwrite),
        (
            r"cannot do a \w+ reset in the middle of a merge|you need to resolve your current index first",
            ResetReason::UnmergedChanges,
        ),
        (r"entry '[^']+' not uptodate", ResetReason::EntryNotUpToDate),
        (r"cannot lock ref|unable to create '[^']+\.lock'", ResetReason::RefLocked),
        (r"permission denied", ResetReason::PermissionDenied),
    ])
});

static STASH_APPLY_RULES: LazyLock<Vec<Rule<StashApplyReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"is not a stash-like commit|no stash entries found|log for 'refs/stash' only has",
            StashApplyReason::NoStash,
        ),
        (
            r"would be overwritten by merge|already exists, no checkout",
            StashApplyReason::WouldOverwrite,
        ),
        (CONFLICT, StashApplyReason::Conflict),
    ])
});

static STASH_PUSH_RULES: LazyLock<Vec<Rule<StashPushReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"cannot remove worktree changes",
            StashPushReason::ConflictingStagedAndUnstagedLines,
        ),
        (
            r"needs merge|you need to resolve your current index first",
            StashPushReason::UnmergedFiles,
        ),
        (r"no local changes to save", StashPushReason::NothingToSave),
    ])
});

static BRANCH_RULES: LazyLock<Vec<Rule<BranchReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"cannot delete branch '[^']+' (?:checked out|used by worktree) at",
            BranchReason::CheckedOutElsewhere,
        ),
        (r"is not fully merged", BranchReason::NotFullyMerged),
        (r"is not a valid branch name", BranchReason::InvalidName),
        (r"a branch named '[^']+' already exists", BranchReason::AlreadyExists),
        (
            r"branch '[^']+' not found|remote ref does not exist",
            BranchReason::DoesNotExist,
        ),
        (REMOTE_CONNECTION, BranchReason::RemoteConnection),
    ])
});

static TAG_RULES: LazyLock<Vec<Rule<TagReason>>> = LazyLock::new(|| {
    rules(&[
        (r"tag '[^']+' already exists", TagReason::AlreadyExists),
        (r"tag '[^']+' not found", TagReason::NotFound),
        (r"is not a valid tag name", TagReason::InvalidName),
        (r"permission(?: to \S+)? denied|error: 403", TagReason::PermissionDenied),
        (REMOTE_CONNECTION, TagReason::RemoteConnection),
        (r"! \[(?:remote )?rejected\]", TagReason::RemoteRejected),
    ])
});

static WORKTREE_RULES: LazyLock<Vec<Rule<WorktreeReason>>> = LazyLock::new(|| {
    rules(&[
        (
            r"is already checked out at|is already used by worktree",
            WorktreeReason::AlreadyCheckedOut,
        ),
        (r"is not an empty directory", WorktreeReason::DirectoryNotEmpty),
        (r"cannot remove a locked working tree|is locked", WorktreeReason::Locked),
        (r"contains modified or untracked files", WorktreeReason::HasChanges),
        (r"is not a working tree", WorktreeReason::NotAWorktree),
        (r"already exists", WorktreeReason::AlreadyExists),
    ])
});

static WARNING_RULES: LazyLock<Vec<Rule<GitWarning>>> = LazyLock::new(|| {
    rules(&[
        (r"not a git repository", GitWarning::NotARepository),
        (r"is outside repository", GitWarning::OutsideRepository),
        (r"no such path", GitWarning::NoSuchPath),
        (r"does not have any commits", GitWarning::NoCommits),
        (r"path '[^']*' does not exist in", GitWarning::PathNotInRevision),
        (r"exists on disk, but not in", GitWarning::PathNotInIndex),
        (r"HEAD does not point to a branch", GitWarning::DetachedHead),
        (r"no upstream configured for branch", GitWarning::NoUpstream),
        (
            r"unknown revision or path not in the working tree|ambiguous argument|bad revision",
            GitWarning::UnknownRevision,
        ),
        (r"must be run in a work tree", GitWarning::NotAWorkTree),
    ])
});

/// Match `failure` against the table for `operation`.
pub fn classify_reason(operation: GitOperation, failure: &GitFailure) -> Option<Reason> {
    match operation {
        GitOperation::Push => first_match(&PUSH_RULES, failure).map(Reason::Push),
        GitOperation::Pull => first_match(&PULL_RULES, failure).map(Reason::Pull),
        GitOperation::Fetch => first_match(&FETCH_RULES, failure).map(Reason::Fetch),
        GitOperation::Merge => first_match(&MERGE_RULES, failure).map(Reason::Merge),
        GitOperation::Rebase => first_match(&REBASE_RULES, failure).map(Reason::Rebase),
        GitOperation::CherryPick => first_match(&CHERRY_PICK_RULES, failure).map(Reason::CherryPick),
        GitOperation::Revert => first_match(&REVERT_RULES, failure).map(Reason::Revert),
        GitOperation::Checkout => first_match(&CHECKOUT_RULES, failure).map(Reason::Checkout),
        GitOperation::Reset => first_match(&RESET_RULES, failure).map(Reason::Reset),
        GitOperation::StashApply => first_match(&STASH_APPLY_RULES, failure).map(Reason::StashApply),
        GitOperation::StashPush => first_match(&STASH_PUSH_RULES, failure).map(Reason::StashPush),
        GitOperation::Branch => first_match(&BRANCH_RULES, failure).map(Reason::Branch),
        GitOperation::Tag => first_match(&TAG_RULES, failure).map(Reason::Tag),
        GitOperation::Worktree => first_match(&WORKTREE_RULES, failure).map(Reason::Worktree),
    }
}

/// Classify and keep the failure alongside the reason.
pub fn classify(operation: GitOperation, failure: GitFailure) -> Classification {
    Classification {
        operation,
        reason: classify_reason(operation, &failure),
        failure,
    }
}

/// The advisory warning `failure` describes, if any.
pub fn check_warning(failure: &GitFailure) -> Option<GitWarning> {
    first_match(&WARNING_RULES, failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(stderr: &str) -> Option<Reason> {
        classify_reason(GitOperation::Push, &GitFailure::from_text(stderr))
    }

    #[test]
    fn test_push_rejected_non_fast_forward() {
        assert_eq!(
            push("! [rejected] main -> main (non-fast-forward)"),
            Some(Reason::Push(PushReason::Rejected))
        );
    }

    #[test]
    fn test_lease_wins_over_generic_rejection() {
        let stderr = "To github.com:o/r.git\n ! [rejected]        main -> main (stale info)\nerror: failed to push some refs";
        assert_eq!(push(stderr), Some(Reason::Push(PushReason::RejectedWithLease)));
    }

    #[test]
    fn test_tip_behind_wins_over_generic_rejection() {
        let stderr = " ! [rejected]        main -> main (non-fast-forward)\n\
                      error: failed to push some refs to 'origin'\n\
                      hint: Updates were rejected because the tip of your current branch is behind";
        assert_eq!(push(stderr), Some(Reason::Push(PushReason::TipBehind)));
    }

    #[test]
    fn test_push_no_upstream_case_insensitive() {
        assert_eq!(
            push("FATAL: The current branch feature HAS NO UPSTREAM BRANCH."),
            Some(Reason::Push(PushReason::NoUpstream))
        );
    }

    #[test]
    fn test_unclassified_keeps_failure_text() {
        let failure = GitFailure::new("git push", 128, String::new(), "something new\n".to_string());
        let result = classify(GitOperation::Push, failure);
        assert!(!result.is_classified());
        assert_eq!(result.label(), "other");
        assert_eq!(result.failure.stderr, "something new\n");
        assert!(result.to_string().contains("something new"));
    }

    #[test]
    fn test_stdout_is_searched() {
        let failure = GitFailure::new(
            "git merge",
            1,
            "CONFLICT (content): Merge conflict in a.txt\n".to_string(),
            String::new(),
        );
        assert_eq!(
            classify_reason(GitOperation::Merge, &failure),
            Some(Reason::Merge(MergeReason::Conflict))
        );
    }

    #[test]
    fn test_other_operations() {
        let cases = [
            (
                GitOperation::Pull,
                "error: cannot pull with rebase: You have unstaged changes.",
                "unstaged-changes",
            ),
            (
                GitOperation::Fetch,
                "fatal: 'upstream' does not appear to be a git repository",
                "no-remote",
            ),
            (
                GitOperation::Branch,
                "error: The branch 'topic' is not fully merged.",
                "not-fully-merged",
            ),
            (GitOperation::StashPush, "No local changes to save", "nothing-to-save"),
            (
                GitOperation::Checkout,
                "error: pathspec 'nope' did not match any file(s) known to git",
                "invalid-ref",
            ),
            (
                GitOperation::Worktree,
                "fatal: 'main' is already checked out at '/repo'",
                "already-checked-out",
            ),
        ];
        for (operation, stderr, expected) in cases {
            let reason = classify_reason(operation, &GitFailure::from_text(stderr));
            assert_eq!(reason.map(|r| r.as_str()), Some(expected), "{operation}: {stderr}");
        }
    }

    #[test]
    fn test_check_warning() {
        let failure = GitFailure::from_text("fatal: not a git repository (or any of the parent directories): .git");
        assert_eq!(check_warning(&failure), Some(GitWarning::NotARepository));

        let failure = GitFailure::from_text("fatal: your current branch 'main' does not have any commits yet");
        assert_eq!(check_warning(&failure), Some(GitWarning::NoCommits));

        assert_eq!(check_warning(&GitFailure::from_text("fatal: index.lock exists")), None);
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("cherry_pick".parse::<GitOperation>(), Ok(GitOperation::CherryPick));
        assert_eq!("Push".parse::<GitOperation>(), Ok(GitOperation::Push));
        assert!("frobnicate".parse::<GitOperation>().is_err());
    }

    #[test]
    fn test_every_table_compiles() {
        let failure = GitFailure::from_text("");
        for operation in GitOperation::ALL {
            assert_eq!(classify_reason(operation, &failure), None);
        }
        assert_eq!(check_warning(&failure), None);
    }
}
