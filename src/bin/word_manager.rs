use clap::{App, Arg, ArgMatches, SubCommand};
use hangman_server::difficulty::Difficulty;
use hangman_server::word_bank::WordBank;

fn word_args<'a>(name: &'a str, about: &'a str) -> App<'a> {
    SubCommand::with_name(name)
        .about(about)
        .arg(
            Arg::with_name("difficulty")
                .help("难度 (easy/moderate/hard)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("word")
                .help("单词，只能包含字母")
                .required(true)
                .index(2),
        )
}

fn parse_word_args<'a>(args: &'a ArgMatches) -> Option<(Difficulty, &'a str)> {
    let difficulty = Difficulty::from_str(args.value_of("difficulty")?);
    let word = args.value_of("word")?;
    Some((difficulty, word))
}

fn save(word_bank: &WordBank) {
    match word_bank.file_path() {
        Some(path) => match word_bank.save_to_file(path) {
            Ok(()) => println!("词库已保存到: {}", path),
            Err(e) => eprintln!("保存词库失败: {}", e),
        },
        None => eprintln!("未配置词库文件 (word_bank.file_path)，修改未保存"),
    }
}

fn main() {
    let matches = App::new("备用词管理器")
        .version("1.0")
        .about("管理猜词游戏的备用词库")
        .subcommand(SubCommand::with_name("list").about("列出每个难度的备用词"))
        .subcommand(word_args("add", "添加备用词"))
        .subcommand(word_args("remove", "删除备用词"))
        .subcommand(SubCommand::with_name("stats").about("显示词库统计信息"))
        .subcommand(SubCommand::with_name("validate").about("验证词库完整性"))
        .subcommand(
            SubCommand::with_name("export").about("导出词库到文件").arg(
                Arg::with_name("file")
                    .help("输出文件路径")
                    .required(true)
                    .index(1),
            ),
        )
        .get_matches();

    // 初始化配置
    if let Err(e) = hangman_server::config::Config::init() {
        eprintln!("配置初始化失败: {}", e);
        return;
    }

    let mut word_bank = WordBank::from_config(&hangman_server::config::Config::get().word_bank);

    match matches.subcommand() {
        Some(("list", _)) => {
            println!("备用词列表:");
            for difficulty in Difficulty::ALL {
                let words = word_bank.fallback_words(difficulty);
                println!("  {}: {} 个词", difficulty, words.len());
                for word in words {
                    println!("    {} (长度 {})", word, word.len());
                }
            }
        }
        Some(("add", args)) => {
            let Some((difficulty, word)) = parse_word_args(args) else {
                eprintln!("参数错误");
                return;
            };
            match word_bank.add_word(difficulty, word) {
                Ok(()) => {
                    println!("成功添加: {} ({})", word.to_ascii_uppercase(), difficulty);
                    save(&word_bank);
                }
                Err(e) => eprintln!("添加失败: {}", e),
            }
        }
        Some(("remove", args)) => {
            let Some((difficulty, word)) = parse_word_args(args) else {
                eprintln!("参数错误");
                return;
            };
            match word_bank.remove_word(difficulty, word) {
                Ok(true) => {
                    println!("成功删除: {} ({})", word.to_ascii_uppercase(), difficulty);
                    save(&word_bank);
                }
                Ok(false) => eprintln!("未找到: {} ({})", word, difficulty),
                Err(e) => eprintln!("删除失败: {}", e),
            }
        }
        Some(("stats", _)) => {
            let stats = word_bank.get_stats();
            println!("词库统计信息:");
            println!("  总词数: {}", stats.total_words);
            println!("  难度分布:");
            for (difficulty, count) in &stats.difficulty_stats {
                let policy = difficulty.policy();
                println!(
                    "    {}: {} 个词 (接口取词长度 {}-{})",
                    difficulty, count, policy.min_len, policy.max_len
                );
            }
        }
        Some(("validate", _)) => {
            let errors = word_bank.validate();
            if errors.is_empty() {
                println!("词库验证通过！");
            } else {
                println!("词库验证发现 {} 个问题:", errors.len());
                for error in errors {
                    println!("  - {}", error);
                }
            }
        }
        Some(("export", args)) => {
            let Some(file_path) = args.value_of("file") else {
                eprintln!("参数错误");
                return;
            };
            if let Err(e) = word_bank.save_to_file(file_path) {
                eprintln!("导出失败: {}", e);
            } else {
                println!("成功导出词库到: {}", file_path);
            }
        }
        _ => {
            println!("请使用 --help 查看可用命令");
        }
    }
}
