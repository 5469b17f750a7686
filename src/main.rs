use anyhow::Result;
use filetalk::{
    CandleQwen, Config, FiletalkError, IntentResolver, LLMBackend, ModelSource, Sandbox, Session,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
요청을 입력하면 명령으로 해석해서 보여줍니다.
  /run, /exec    마지막으로 해석한 명령 실행
  /go <요청>     해석 후 바로 실행
  /cancel        대기 중인 명령 버리기
  Ctrl-C         진행 중인 요청 취소 (대기 중이면 종료)
  /exit          종료";

fn load_backend(config: &Config) -> filetalk::Result<Box<dyn LLMBackend>> {
    let backend = match &config.model {
        ModelSource::Local { model, tokenizer } => {
            CandleQwen::from_files(model, tokenizer, config.seed)?
        }
        ModelSource::Hub {
            repo,
            file,
            tokenizer_repo,
        } => CandleQwen::from_hub(repo, file, tokenizer_repo, config.seed)?,
    };
    Ok(Box::new(backend))
}

/// Awaits `work`; a Ctrl-C in the meantime aborts the model call and the
/// request then finishes with `FiletalkError::Cancelled`.
async fn cancellable<T>(session: &Session, work: impl Future<Output = T>) -> T {
    tokio::pin!(work);
    tokio::select! {
        out = &mut work => out,
        Ok(()) = tokio::signal::ctrl_c() => {
            println!();
            println!(">>> Cancelling...");
            session.cancel();
            work.await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filetalk=info")),
        )
        .init();

    let config = Config::from_env()?;
    let sandbox = Sandbox::new(&config.root)?;

    println!(">>> Loading model (this may take a while)...");
    let backend = tokio::task::spawn_blocking({
        let config = config.clone();
        move || load_backend(&config)
    })
    .await??;

    let resolver = IntentResolver::new(backend).with_timeout(config.timeout);
    let session = Session::new(resolver, sandbox);

    println!(">>> Sandbox root: {}", session.sandbox().root().display());
    println!("{}", HELP);
    println!("------------------------------------------------------------");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"User: ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Ok(()) = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            println!(">>> Bye.");
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("quit") {
            println!(">>> Bye.");
            break;
        }

        match input {
            "/help" => println!("{}", HELP),
            "/cancel" => match session.discard() {
                Some(cmd) => println!("Discarded: {}", cmd.kind()),
                None => println!("Nothing to discard."),
            },
            "/run" | "/exec" => match session.execute().await {
                Ok(output) => println!("{}", output),
                Err(FiletalkError::NoPendingCommand) => {
                    println!("먼저 요청을 입력해서 명령을 해석하세요.")
                }
                Err(e) => eprintln!("[Error] {}", e),
            },
            _ => {
                if let Some(utterance) = input.strip_prefix("/go ") {
                    match cancellable(&session, session.run(utterance)).await {
                        Ok((interpretation, output)) => {
                            println!("{}", interpretation.command.to_pretty_json());
                            println!("{}", output);
                        }
                        Err(FiletalkError::Cancelled) => println!("요청을 취소했습니다."),
                        Err(e) => eprintln!("[Error] {}", e),
                    }
                } else {
                    match cancellable(&session, session.interpret(input)).await {
                        Ok(interpretation) => {
                            if interpretation.fell_back {
                                println!("(모델 응답을 해석하지 못해 기본 명령을 사용합니다)");
                            }
                            println!("{}", interpretation.command.to_pretty_json());
                            if interpretation.command.mutates() {
                                println!("실행하면 샌드박스 안의 파일이 바뀝니다.");
                            }
                            println!("실행하려면 /run");
                        }
                        Err(FiletalkError::Cancelled) => println!("요청을 취소했습니다."),
                        Err(e) => eprintln!("[Error] {}", e),
                    }
                }
            }
        }

        println!("------------------------------------------------------------");
    }

    Ok(())
}
