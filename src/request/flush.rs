use crate::{Status, recorder::TimeRecorder};

use super::{Context, Output, Phase, RequestKind, describe_root_table, translate_set};

const KIND: RequestKind = RequestKind::Flush;

/// Flushes a set of root tables. Every name is validated and resolved before the
/// engine is asked to flush anything; the first failing name fails the request.
pub(super) fn execute(
    ctx: &Context,
    tables: &[String],
    rc: &mut TimeRecorder,
) -> Result<Output, Status> {
    if tables.is_empty() {
        return Err(Status::invalid_argument(
            "flush requires at least one table name",
        ));
    }

    // step 1: check arguments, root tables only
    for table in tables {
        ctx.validator().validate_name(table)?;
    }
    for table in tables {
        describe_root_table(ctx, KIND, table)?;
    }
    rc.section("check validation");

    // step 2: flush
    ctx.faults()
        .intercept(KIND.point(Phase::Delegate), || ctx.engine().flush(tables))
        .map_err(|err| translate_set(err, tables))?;

    Ok(Output::Unit)
}

#[cfg(test)]
mod tests {
    use crate::{
        EngineError, RequestHandle, StatusCode,
        fault::Fault,
        request::testing::harness,
    };

    use super::*;

    #[test]
    fn flushes_every_table() {
        let h = harness();
        h.engine.inner.create_table("t2").unwrap();
        h.engine.inner.insert("t1", 3).unwrap();
        h.engine.inner.insert("t2", 4).unwrap();

        let reply = RequestHandle::flush(&h.ctx, ["t1", "t2"]).execute();

        assert!(reply.is_ok());
        assert_eq!(h.engine.inner.persisted_rows("t1").unwrap(), 3);
        assert_eq!(h.engine.inner.persisted_rows("t2").unwrap(), 4);
        assert_eq!(h.engine.calls().last().unwrap(), "flush(t1,t2)");
    }

    #[test]
    fn invalid_name_flushes_nothing() {
        for tables in [["t1", "b-d"], ["b-d", "t1"]] {
            let h = harness();
            h.engine.inner.insert("t1", 3).unwrap();

            let reply = RequestHandle::flush(&h.ctx, tables).execute();

            assert_eq!(reply.status().code(), StatusCode::InvalidArgument);
            assert!(h.engine.calls().is_empty());
            assert_eq!(h.engine.inner.persisted_rows("t1").unwrap(), 0);
        }
    }

    #[test]
    fn unknown_table_flushes_nothing() {
        for tables in [["t1", "missing"], ["missing", "t1"]] {
            let h = harness();

            let reply = RequestHandle::flush(&h.ctx, tables).execute();

            assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
            assert!(
                !h.engine
                    .calls()
                    .iter()
                    .any(|call| call.starts_with("flush"))
            );
        }
    }

    #[test]
    fn empty_set_is_invalid() {
        let h = harness();

        let reply = RequestHandle::flush(&h.ctx, Vec::<String>::new()).execute();

        assert_eq!(reply.status().code(), StatusCode::InvalidArgument);
        assert!(h.engine.calls().is_empty());
    }

    #[test]
    fn flush_fault() {
        let h = harness();
        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::NotFound("t1".into())),
        );

        let reply = RequestHandle::flush(&h.ctx, ["t1"]).execute();

        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        assert_eq!(h.engine.calls(), vec!["describe_table(t1)"]);
    }

    #[test]
    fn not_found_names_a_requested_table() {
        let h = harness();
        h.engine.inner.create_table("t2").unwrap();

        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::NotFound("t2".into())),
        );
        let reply = RequestHandle::flush(&h.ctx, ["t1", "t2"]).execute();
        assert_eq!(reply.status().message(), "table 't2' does not exist");

        h.faults.arm(
            KIND.point(Phase::Delegate),
            Fault::Engine(EngineError::NotFound(String::new())),
        );
        let reply = RequestHandle::flush(&h.ctx, ["t1", "t2"]).execute();
        assert_eq!(reply.status().code(), StatusCode::EntityNotFound);
        assert_eq!(reply.status().message(), "table 't1,t2' does not exist");
    }

    #[test]
    fn bad_partition_tag_never_reaches_flush() {
        let h = harness();
        h.engine.inner.insert("t1", 2).unwrap();
        assert!(h.engine.inner.create_partition("t1", "a/b").is_err());

        let reply = RequestHandle::flush(&h.ctx, ["t1"]).execute();

        assert!(reply.is_ok());
        assert_eq!(h.engine.inner.persisted_rows("t1").unwrap(), 2);
    }
}
